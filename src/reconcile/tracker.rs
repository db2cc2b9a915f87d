//! Grace-period bookkeeping for units whose machine has gone away.
//!
//! A managed unit that no longer matches a desired unit is not destroyed on
//! sight. The first cycle that sees it undesired records the instant; the unit
//! is only destroyed once it has stayed undesired for `delete_after`. If its
//! machine reappears in the meantime the entry is dropped ("revived").

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

use crate::types::{Unit, UnitName};

/// When a unit was first seen undesired.
#[derive(Debug, Clone, Copy)]
pub struct TrackedUnit {
    /// Monotonic instant used for the grace-period arithmetic.
    pub since: Instant,

    /// Wall-clock time, for reporting only.
    pub first_seen_at: DateTime<Utc>,
}

/// What the tracker decided about an undesired unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// First sighting; tracking starts now.
    NewlyUndesired,

    /// Still inside the grace period.
    Pending { remaining: Duration },

    /// The grace period has elapsed; the unit should be destroyed.
    Expired,
}

/// A tracked unit as exposed in status snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedUnitStatus {
    pub name: UnitName,
    pub first_seen_at: DateTime<Utc>,
    pub remaining_secs: u64,
}

/// Unit name to first-seen-undesired instant.
#[derive(Debug)]
pub struct UndesiredTracker {
    delete_after: Duration,
    entries: BTreeMap<UnitName, TrackedUnit>,
}

impl UndesiredTracker {
    pub fn new(delete_after: Duration) -> Self {
        UndesiredTracker {
            delete_after,
            entries: BTreeMap::new(),
        }
    }

    pub fn delete_after(&self) -> Duration {
        self.delete_after
    }

    /// Drops the entries of every unit that is desired again.
    ///
    /// Returns the names that were revived.
    pub fn revive<'a>(&mut self, desired: impl IntoIterator<Item = &'a Unit>) -> Vec<UnitName> {
        desired
            .into_iter()
            .filter(|unit| self.entries.remove(&unit.name).is_some())
            .map(|unit| unit.name.clone())
            .collect()
    }

    /// Drops the entries of units that no longer exist in fleet.
    ///
    /// A unit removed by someone else never shows up as undesired again, so
    /// its entry would otherwise stay forever. Returns the names dropped.
    pub fn retain_managed<'a>(
        &mut self,
        managed: impl IntoIterator<Item = &'a Unit>,
    ) -> Vec<UnitName> {
        let live: BTreeSet<&UnitName> = managed.into_iter().map(|unit| &unit.name).collect();
        let gone: Vec<UnitName> = self
            .entries
            .keys()
            .filter(|name| !live.contains(name))
            .cloned()
            .collect();
        for name in &gone {
            self.entries.remove(name);
        }
        gone
    }

    /// Records a sighting of an undesired unit at `now`.
    ///
    /// The entry is never removed here; call [`remove`](Self::remove) once the
    /// unit has actually been destroyed.
    pub fn observe(&mut self, unit: &Unit, now: Instant) -> Observation {
        match self.entries.get(&unit.name) {
            None => {
                self.entries.insert(
                    unit.name.clone(),
                    TrackedUnit {
                        since: now,
                        first_seen_at: Utc::now(),
                    },
                );
                Observation::NewlyUndesired
            }
            Some(tracked) => {
                let elapsed = now.saturating_duration_since(tracked.since);
                if elapsed >= self.delete_after {
                    Observation::Expired
                } else {
                    Observation::Pending {
                        remaining: self.delete_after - elapsed,
                    }
                }
            }
        }
    }

    /// Stops tracking a unit. Returns true if it was tracked.
    pub fn remove(&mut self, name: &UnitName) -> bool {
        self.entries.remove(name).is_some()
    }

    pub fn contains(&self, name: &UnitName) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &UnitName) -> Option<&TrackedUnit> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of every tracked unit, ordered by name.
    pub fn status(&self, now: Instant) -> Vec<TrackedUnitStatus> {
        self.entries
            .iter()
            .map(|(name, tracked)| TrackedUnitStatus {
                name: name.clone(),
                first_seen_at: tracked.first_seen_at,
                remaining_secs: self
                    .delete_after
                    .saturating_sub(now.saturating_duration_since(tracked.since))
                    .as_secs(),
            })
            .collect()
    }
}
