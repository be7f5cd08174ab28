//! Packing work units onto fixed-capacity execution slots.

use ps_types::{config_error, SweepResult};
use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::unit::WorkUnit;

/// How many units fit on one node: `floor(cores_per_node / cores_per_unit)`.
pub fn slot_capacity(cores_per_node: usize, cores_per_unit: usize) -> SweepResult<usize> {
    if cores_per_unit == 0 {
        return Err(config_error!("cores_per_unit must be at least 1"));
    }
    let capacity = cores_per_node / cores_per_unit;
    if capacity < 1 {
        return Err(config_error!(
            "a node with {cores_per_node} cores cannot host a unit needing {cores_per_unit}"
        ));
    }
    Ok(capacity)
}

/// A contiguous run of units sharing one scheduler job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSlot {
    pub index: usize,
    /// Unit indices hosted by this slot.
    pub units: Range<usize>,
}

impl ExecutionSlot {
    pub fn name(&self) -> String {
        format!("slot{}", self.index)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// The result of packing an ordered unit sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packing {
    pub capacity: usize,
    pub unit_count: usize,
    pub slots: Vec<ExecutionSlot>,
}

impl Packing {
    /// Number of units on the last slot when it is not full, otherwise 0.
    pub fn remainder(&self) -> usize {
        self.unit_count % self.capacity
    }

    pub fn has_partial_slot(&self) -> bool {
        self.remainder() != 0
    }

    /// The units hosted by `slot`, borrowed from the sequence that was packed.
    pub fn slot_units<'a>(&self, slot: &ExecutionSlot, units: &'a [WorkUnit]) -> &'a [WorkUnit] {
        &units[slot.units.clone()]
    }
}

/// Split `units` into consecutive slots of `capacity`; slot `i` holds units
/// `[i * capacity, (i + 1) * capacity)` and the last one takes the remainder.
pub fn pack(units: &[WorkUnit], capacity: usize) -> SweepResult<Packing> {
    if capacity < 1 {
        return Err(config_error!("slot capacity must be at least 1"));
    }
    let unit_count = units.len();
    let slots = (0..unit_count)
        .step_by(capacity)
        .enumerate()
        .map(|(index, start)| ExecutionSlot {
            index,
            units: start..(start + capacity).min(unit_count),
        })
        .collect();

    Ok(Packing {
        capacity,
        unit_count,
        slots,
    })
}
