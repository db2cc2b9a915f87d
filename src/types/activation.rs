//! Unit lifecycle states.
//!
//! Fleet tracks two independent notions of state for a unit:
//!
//! - the **target state** this controller asks for (`inactive`, `loaded`,
//!   `launched`), and
//! - the **activation state** systemd reports on the machine (`active`,
//!   `failed`, ...).
//!
//! The operator sets the former and polls the latter.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The target state requested from fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetState {
    Inactive,
    Loaded,
    Launched,
}

impl TargetState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetState::Inactive => "inactive",
            TargetState::Loaded => "loaded",
            TargetState::Launched => "launched",
        }
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The systemd activation state reported for a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationState {
    Active,
    Reloading,
    Inactive,
    Failed,
    Activating,
    Deactivating,
    Dead,

    /// Anything systemd reports that we don't model.
    #[serde(other)]
    Unknown,
}

impl ActivationState {
    /// States a started unit settles in.
    pub const RUNNING: &'static [ActivationState] = &[ActivationState::Active];

    /// States a stopped unit settles in.
    pub const STOPPED: &'static [ActivationState] = &[
        ActivationState::Failed,
        ActivationState::Dead,
        ActivationState::Inactive,
    ];

    pub fn parse(s: &str) -> Self {
        match s {
            "active" => ActivationState::Active,
            "reloading" => ActivationState::Reloading,
            "inactive" => ActivationState::Inactive,
            "failed" => ActivationState::Failed,
            "activating" => ActivationState::Activating,
            "deactivating" => ActivationState::Deactivating,
            "dead" => ActivationState::Dead,
            _ => ActivationState::Unknown,
        }
    }
}

impl fmt::Display for ActivationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActivationState::Active => "active",
            ActivationState::Reloading => "reloading",
            ActivationState::Inactive => "inactive",
            ActivationState::Failed => "failed",
            ActivationState::Activating => "activating",
            ActivationState::Deactivating => "deactivating",
            ActivationState::Dead => "dead",
            ActivationState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}
