//! Cycle reports and status snapshots.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::reconcile::TrackedUnitStatus;
use crate::types::UnitName;

/// What one successful reconcile cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub machines_total: usize,
    pub machines_active: usize,
    pub units_total: usize,
    pub units_managed: usize,

    /// Units created because their machine had none.
    pub created: Vec<UnitName>,

    /// Drifted units destroyed and re-created.
    pub updated: Vec<UnitName>,

    /// Drifted units left alone because of the cooldown.
    pub skipped_cooldown: Vec<UnitName>,

    /// Active units whose definition matched.
    pub unchanged: usize,

    pub newly_undesired: Vec<UnitName>,
    pub revived: Vec<UnitName>,
    pub deleted: Vec<UnitName>,

    /// Tracked units that disappeared from fleet before their grace period ended.
    pub forgotten: Vec<UnitName>,

    /// Units tracked as undesired at the end of the cycle.
    pub undesired_tracked: usize,
}

/// How the most recent cycle ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CycleOutcome {
    Succeeded {
        finished_at: DateTime<Utc>,
        report: CycleReport,
    },
    Failed {
        finished_at: DateTime<Utc>,
        error: String,
    },
}

impl CycleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CycleOutcome::Succeeded { .. })
    }
}

/// Point-in-time view of the service, served by `GET /api/v1/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub dry_run: bool,
    pub cycles: u64,
    pub cooldown_active: bool,
    pub cooldown_remaining_secs: u64,
    pub undesired: Vec<TrackedUnitStatus>,
    pub last_cycle: Option<CycleOutcome>,
}
