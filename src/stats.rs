//! Counters and gauges emitted by the reconciler.
//!
//! The reconciler reports through [`StatsCollector`] and never waits on it.
//! [`TracingStats`] turns every observation into a structured `tracing` event
//! under the `stats` target, so `RUST_LOG=stats=info` isolates them.

use tracing::info;

use crate::types::{Unit, UnitName};

/// Receives reconciliation statistics.
///
/// Gauges are reported once per cycle; counters once per occurrence.
pub trait StatsCollector: Send + Sync {
    /// Machines reported by fleet, before tag filtering.
    fn seen_machines_total(&self, count: usize);

    /// Machines left after tag filtering.
    fn seen_machines_active(&self, count: usize);

    /// Units reported by fleet, managed or not.
    fn seen_units_total(&self, count: usize);

    /// Units carrying our prefix.
    fn seen_units_managed(&self, count: usize);

    /// Desired units that did not exist yet.
    fn new_units(&self, count: usize);

    /// Desired units that already existed.
    fn active_units_seen(&self, count: usize);

    fn update_required(&self, count: usize);

    fn no_update_required(&self, count: usize);

    /// A drifted unit was left alone because the cooldown gate was active.
    fn update_skipped_cooldown(&self, unit: &Unit);

    /// A managed unit was seen undesired for the first time.
    fn new_undesired(&self, unit: &Unit);

    /// A tracked unit became desired again.
    fn revived_undesired(&self, name: &UnitName);

    /// A tracked unit outlived its grace period and was destroyed.
    fn deleted_undesired(&self, unit: &Unit);

    /// Units currently tracked as undesired.
    fn undesired_units(&self, count: usize);
}

/// Reports statistics as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingStats;

impl TracingStats {
    fn gauge(name: &'static str, value: usize) {
        info!(target: "stats", stat = name, value, "gauge");
    }

    fn counter(name: &'static str, unit: &str) {
        info!(target: "stats", stat = name, unit, "counter");
    }
}

impl StatsCollector for TracingStats {
    fn seen_machines_total(&self, count: usize) {
        Self::gauge("seen_machines_total", count);
    }

    fn seen_machines_active(&self, count: usize) {
        Self::gauge("seen_machines_active", count);
    }

    fn seen_units_total(&self, count: usize) {
        Self::gauge("seen_units_total", count);
    }

    fn seen_units_managed(&self, count: usize) {
        Self::gauge("seen_units_managed", count);
    }

    fn new_units(&self, count: usize) {
        Self::gauge("new_units", count);
    }

    fn active_units_seen(&self, count: usize) {
        Self::gauge("active_units_seen", count);
    }

    fn update_required(&self, count: usize) {
        Self::gauge("active_units_update_required", count);
    }

    fn no_update_required(&self, count: usize) {
        Self::gauge("active_units_no_update_required", count);
    }

    fn update_skipped_cooldown(&self, unit: &Unit) {
        Self::counter("update_skipped_cooldown", unit.name.as_str());
    }

    fn new_undesired(&self, unit: &Unit) {
        Self::counter("undesired_new", unit.name.as_str());
    }

    fn revived_undesired(&self, name: &UnitName) {
        Self::counter("undesired_revived", name.as_str());
    }

    fn deleted_undesired(&self, unit: &Unit) {
        Self::counter("undesired_deleted", unit.name.as_str());
    }

    fn undesired_units(&self, count: usize) {
        Self::gauge("undesired_units", count);
    }
}
