//! Core domain types for the unit replicator.
//!
//! This module contains the value types shared by the reconciler, the operator
//! and the fleet client.

pub mod activation;
pub mod ids;
pub mod unit;

// Re-export commonly used types at the module level
pub use activation::{ActivationState, TargetState};
pub use ids::{MachineId, UnitName};
pub use unit::{DriftComparison, Machine, OptionSet, Unit, UnitOption};
