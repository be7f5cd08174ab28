//! # ps-sweep
//!
//! Sweep definition and expansion for parsweep.
//!
//! Provides the parameter space model (independent parameters and lockstep
//! groups), the deterministic mixed-radix enumeration of work units, packing
//! of units onto fixed-capacity execution slots, and materialization of each
//! unit into its own working directory.

mod enumerate;
mod materialize;
mod pack;
mod space;
mod unit;

pub use enumerate::{enumerate, unit_at};
pub use materialize::{rewrite_lines, ExecutionContext, Materializer, TemplateMaterializer};
pub use pack::{pack, slot_capacity, ExecutionSlot, Packing};
pub use space::{Dimension, ParameterSpace, SpaceBuilder};
pub use unit::{canonical_name, Assignment, WorkUnit};
