//! Partitioning desired units against managed units.

use thiserror::Error;

use crate::types::Unit;

/// Error returned when there is nothing to compare against.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("desired unit set is empty")]
pub struct EmptyDesiredSet;

/// The outcome of comparing desired units with managed units.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitDiff {
    /// Desired units with no managed unit of the same name.
    pub new: Vec<Unit>,

    /// Desired units with a managed unit of the same name.
    pub active: Vec<Unit>,

    /// Managed units that no desired unit equals (name and machine).
    pub undesired: Vec<Unit>,
}

impl UnitDiff {
    /// Returns true if nothing needs creating or removing.
    pub fn is_converged(&self) -> bool {
        self.new.is_empty() && self.undesired.is_empty()
    }
}

/// Compares the desired set with the managed set.
///
/// Order within each partition follows the input order. An empty desired set
/// is refused: with zero machines every managed unit would look undesired.
pub fn diff_units(desired: &[Unit], managed: &[Unit]) -> Result<UnitDiff, EmptyDesiredSet> {
    if desired.is_empty() {
        return Err(EmptyDesiredSet);
    }

    let mut diff = UnitDiff::default();

    for unit in desired {
        if managed.iter().any(|m| m.name == unit.name) {
            diff.active.push(unit.clone());
        } else {
            diff.new.push(unit.clone());
        }
    }

    for unit in managed {
        if !desired.contains(unit) {
            diff.undesired.push(unit.clone());
        }
    }

    Ok(diff)
}
