//! The pure parts of reconciliation: the diff, the undesired-unit grace
//! period, and the update cooldown.

mod cooldown;
mod diff;
mod tracker;

pub use cooldown::CooldownGate;
pub use diff::{EmptyDesiredSet, UnitDiff, diff_units};
pub use tracker::{Observation, TrackedUnit, TrackedUnitStatus, UndesiredTracker};
