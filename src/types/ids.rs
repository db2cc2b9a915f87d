//! Newtype wrappers for domain identifiers.
//!
//! These types prevent accidental mixing of machine IDs and unit names, both of
//! which are plain strings on the wire.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Suffix carried by every unit this controller manages.
const UNIT_SUFFIX: &str = ".service";

/// A fleet machine identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MachineId(pub String);

impl MachineId {
    pub fn new(s: impl Into<String>) -> Self {
        MachineId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MachineId {
    fn from(s: &str) -> Self {
        MachineId(s.to_string())
    }
}

impl From<String> for MachineId {
    fn from(s: String) -> Self {
        MachineId(s)
    }
}

/// A fleet unit name, e.g. `svc-4f2a.service`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitName(pub String);

impl UnitName {
    pub fn new(s: impl Into<String>) -> Self {
        UnitName(s.into())
    }

    /// Derives the name of the unit owned by `machine`.
    ///
    /// The name is `<prefix>-<machine>.service`, which makes the unit/machine
    /// relation a pure function of the two.
    pub fn for_machine(prefix: &str, machine: &MachineId) -> Self {
        UnitName(format!("{}-{}{}", prefix, machine, UNIT_SUFFIX))
    }

    /// Returns true if this unit carries the given prefix.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UnitName {
    fn from(s: &str) -> Self {
        UnitName(s.to_string())
    }
}

impl From<String> for UnitName {
    fn from(s: String) -> Self {
        UnitName(s)
    }
}
