//! Machines, units and unit definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ids::{MachineId, UnitName};

/// A fleet member as reported by the backend.
///
/// Machines are fetched fresh every cycle and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    pub id: MachineId,

    /// Tag metadata, e.g. `role=worker`.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Machine {
    pub fn new(id: impl Into<MachineId>) -> Self {
        Machine {
            id: id.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns true if the machine carries `key`, regardless of its value.
    pub fn has_tag(&self, key: &str) -> bool {
        self.metadata.contains_key(key)
    }
}

/// A unit this controller wants to exist, or one it found in the backend.
///
/// Two units are equal only if both the name and the machine match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unit {
    pub name: UnitName,
    pub machine_id: MachineId,
}

impl Unit {
    pub fn new(name: impl Into<UnitName>, machine_id: impl Into<MachineId>) -> Self {
        Unit {
            name: name.into(),
            machine_id: machine_id.into(),
        }
    }

    /// Builds the desired unit for a machine.
    pub fn for_machine(prefix: &str, machine: &MachineId) -> Self {
        Unit {
            name: UnitName::for_machine(prefix, machine),
            machine_id: machine.clone(),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.machine_id)
    }
}

/// One `Section/Name=Value` entry of a unit definition.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitOption {
    pub section: String,
    pub name: String,
    pub value: String,
}

impl UnitOption {
    pub fn new(
        section: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        UnitOption {
            section: section.into(),
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for UnitOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}={}", self.section, self.name, self.value)
    }
}

/// How two option sets are compared when checking for drift.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftComparison {
    /// Both sides hold the same options with the same multiplicities.
    #[default]
    Strict,

    /// Both sides have the same length and every left option appears on the
    /// right. Duplicates on the left can hide options that only exist on the
    /// right.
    Subset,
}

impl FromStr for DriftComparison {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strict" => Ok(DriftComparison::Strict),
            "subset" => Ok(DriftComparison::Subset),
            other => Err(format!(
                "unknown drift comparison '{}', expected 'strict' or 'subset'",
                other
            )),
        }
    }
}

/// An ordered unit definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionSet(pub Vec<UnitOption>);

impl OptionSet {
    pub fn new(options: Vec<UnitOption>) -> Self {
        OptionSet(options)
    }

    pub fn push(&mut self, option: UnitOption) {
        self.0.push(option);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnitOption> {
        self.0.iter()
    }

    /// Returns the value of the first option with this section and name.
    pub fn get(&self, section: &str, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|o| o.section == section && o.name == name)
            .map(|o| o.value.as_str())
    }

    /// Compares two definitions, ignoring option order.
    pub fn matches(&self, other: &OptionSet, comparison: DriftComparison) -> bool {
        if self.len() != other.len() {
            return false;
        }

        match comparison {
            DriftComparison::Strict => {
                let mut left: Vec<&UnitOption> = self.0.iter().collect();
                let mut right: Vec<&UnitOption> = other.0.iter().collect();
                left.sort();
                right.sort();
                left == right
            }
            DriftComparison::Subset => self.0.iter().all(|o| other.0.contains(o)),
        }
    }
}

impl From<Vec<UnitOption>> for OptionSet {
    fn from(options: Vec<UnitOption>) -> Self {
        OptionSet(options)
    }
}

impl IntoIterator for OptionSet {
    type Item = UnitOption;
    type IntoIter = std::vec::IntoIter<UnitOption>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
