//! Deterministic enumeration of a parameter space.
//!
//! The space is walked as a mixed-radix counter: each dimension is a digit
//! whose radix is its number of values, and unit `n` takes position
//! `(n / skip) % radix` in every digit, where `skip` is the product of the
//! radices of the digits before it. Any unit can be computed directly from
//! its index, so there is no iteration state to carry around.

use std::collections::BTreeMap;
use tracing::debug;

use crate::space::{Dimension, ParameterSpace};
use crate::unit::{Assignment, WorkUnit};

struct Digit<'a> {
    name: &'a str,
    dimension: &'a Dimension,
    skip: usize,
}

/// Digits in a fixed order together with their place values.
struct Odometer<'a> {
    digits: Vec<Digit<'a>>,
    total: usize,
}

impl<'a> Odometer<'a> {
    fn new(space: &'a ParameterSpace, order: &[&'a str]) -> Self {
        let mut skip = 1;
        let mut digits = Vec::with_capacity(order.len());
        for &name in order {
            let dimension = &space.dimensions()[name];
            digits.push(Digit {
                name,
                dimension,
                skip,
            });
            // Cannot overflow: the space validated the full product.
            skip *= dimension.radix();
        }
        Self {
            digits,
            total: space.unit_count(),
        }
    }

    fn assignments_at(&self, index: usize) -> BTreeMap<String, Assignment> {
        self.digits
            .iter()
            .map(|digit| {
                let position = (index / digit.skip) % digit.dimension.radix();
                (
                    digit.name.to_string(),
                    digit.dimension.assignment_at(position),
                )
            })
            .collect()
    }
}

fn lexicographic_order(space: &ParameterSpace) -> Vec<&str> {
    space.dimensions().keys().map(String::as_str).collect()
}

/// The unit at odometer position `index`, before sorting. The first
/// dimension in name order varies fastest. Returns `None` past the end.
pub fn unit_at(space: &ParameterSpace, index: usize) -> Option<WorkUnit> {
    if index >= space.unit_count() {
        return None;
    }
    let odometer = Odometer::new(space, &lexicographic_order(space));
    Some(WorkUnit::new(index, odometer.assignments_at(index)))
}

/// Every unit of the space, sorted by assignment and re-indexed so that
/// `units[i].index == i`.
pub fn enumerate(space: &ParameterSpace) -> Vec<WorkUnit> {
    enumerate_with_digit_order(space, &lexicographic_order(space))
}

/// `order` must be a permutation of the space's dimension names. The sorted
/// result does not depend on it.
fn enumerate_with_digit_order(space: &ParameterSpace, order: &[&str]) -> Vec<WorkUnit> {
    let odometer = Odometer::new(space, order);
    let mut units: Vec<WorkUnit> = (0..odometer.total)
        .map(|n| WorkUnit::new(n, odometer.assignments_at(n)))
        .collect();

    units.sort();
    for (position, unit) in units.iter_mut().enumerate() {
        unit.index = position;
    }

    debug!(
        units = units.len(),
        dimensions = space.len(),
        "enumerated parameter space"
    );
    units
}
