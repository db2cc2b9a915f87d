//! The replicator service: one reconcile cycle per tick.
//!
//! # Cycle
//!
//! 1. Fetch machines and keep those carrying the machine tag (if set)
//! 2. Derive one desired unit per machine
//! 3. Fetch units and keep those carrying the unit prefix
//! 4. Diff desired against managed
//! 5. Create new units
//! 6. Check active units for drift and update them through the cooldown gate
//! 7. Drive the undesired tracker: revive, start tracking, or destroy
//!
//! Any error aborts the rest of the cycle. Nothing carries over between
//! cycles except the tracker and the gate.
//!
//! # Event Loop
//!
//! The service runs as a single tokio task. Each `select!` iteration handles
//! one of: shutdown, a control message, or a tick. A cycle in progress is
//! never interrupted; shutdown and control messages are observed between
//! cycles.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::fleet::{FleetApi, FleetApiError, FleetUnit, RetryConfig, retry};
use crate::operator::{OperatorError, UnitOperator};
use crate::reconcile::{CooldownGate, EmptyDesiredSet, Observation, UndesiredTracker, diff_units};
use crate::stats::StatsCollector;
use crate::template::UnitTemplate;
use crate::types::{DriftComparison, Machine, MachineId, OptionSet, Unit, UnitName};

use super::message::{ServiceHandle, ServiceMessage};
use super::status::{CycleOutcome, CycleReport, StatusSnapshot};

/// Capacity of the control channel.
const CONTROL_CHANNEL_CAPACITY: usize = 16;

/// Default pause between destroying a drifted unit and re-creating it.
pub const DEFAULT_UPDATE_SETTLE_SECS: u64 = 15;

/// Errors that abort a reconcile cycle.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// No machine survived the tag filter.
    #[error("no machines found to act on")]
    NoMachines,

    /// A read from fleet failed.
    #[error("fleet request failed while {action}: {source}")]
    Fleet {
        action: &'static str,
        #[source]
        source: FleetApiError,
    },

    /// The operator failed to create or destroy a unit.
    #[error("failed to {action} {unit}: {source}")]
    Operator {
        action: &'static str,
        unit: UnitName,
        #[source]
        source: OperatorError,
    },
}

// Desired units are derived one per machine, so an empty desired set means
// no machines.
impl From<EmptyDesiredSet> for ReconcileError {
    fn from(_: EmptyDesiredSet) -> Self {
        ReconcileError::NoMachines
    }
}

impl ReconcileError {
    fn fleet(action: &'static str) -> impl FnOnce(FleetApiError) -> Self {
        move |source| ReconcileError::Fleet { action, source }
    }

    fn operator(action: &'static str, unit: &UnitName) -> impl FnOnce(OperatorError) -> Self {
        let unit = unit.clone();
        move |source| ReconcileError::Operator {
            action,
            unit,
            source,
        }
    }
}

/// Result type for reconcile operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Immutable configuration of the service.
#[derive(Debug, Clone)]
pub struct ReplicatorConfig {
    /// Interval between cycles.
    pub tick_interval: Duration,

    /// How long a unit must stay undesired before it is destroyed.
    pub delete_time: Duration,

    /// Minimum time between two destructive updates, cluster-wide.
    pub update_cooldown: Duration,

    /// Pause between destroy and re-create during an update.
    pub update_settle_time: Duration,

    /// Only machines carrying this metadata key get a unit. `None` keeps all.
    pub machine_tag: Option<String>,

    /// Prefix of every unit this service manages.
    pub unit_prefix: String,

    pub template: UnitTemplate,

    pub drift_comparison: DriftComparison,

    /// Retry policy for fleet reads made by the service itself.
    pub retry: RetryConfig,
}

impl ReplicatorConfig {
    /// Creates a configuration with default timings.
    pub fn new(unit_prefix: impl Into<String>, template: UnitTemplate) -> Self {
        ReplicatorConfig {
            tick_interval: Duration::from_secs(60),
            delete_time: Duration::from_secs(60 * 60),
            update_cooldown: Duration::from_secs(15 * 60),
            update_settle_time: Duration::from_secs(DEFAULT_UPDATE_SETTLE_SECS),
            machine_tag: None,
            unit_prefix: unit_prefix.into(),
            template,
            drift_comparison: DriftComparison::default(),
            retry: RetryConfig::DEFAULT,
        }
    }
}

/// Whether a drifted unit was updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpdateOutcome {
    Updated,
    SkippedCooldown,
}

/// The replicator service.
///
/// Owns the undesired tracker and the cooldown gate; nothing else mutates them.
pub struct Service<F, O> {
    config: ReplicatorConfig,
    fleet: Arc<F>,
    operator: O,
    stats: Arc<dyn StatsCollector>,
    undesired: UndesiredTracker,
    cooldown: CooldownGate,
    last_cycle: Option<CycleOutcome>,
    cycles: u64,
}

impl<F: FleetApi, O: UnitOperator> Service<F, O> {
    pub fn new(
        config: ReplicatorConfig,
        fleet: Arc<F>,
        operator: O,
        stats: Arc<dyn StatsCollector>,
    ) -> Self {
        let undesired = UndesiredTracker::new(config.delete_time);
        let cooldown = CooldownGate::new(config.update_cooldown);
        Service {
            config,
            fleet,
            operator,
            stats,
            undesired,
            cooldown,
            last_cycle: None,
            cycles: 0,
        }
    }

    pub fn undesired(&self) -> &UndesiredTracker {
        &self.undesired
    }

    pub fn cooldown(&self) -> &CooldownGate {
        &self.cooldown
    }

    pub fn last_cycle(&self) -> Option<&CycleOutcome> {
        self.last_cycle.as_ref()
    }

    /// Clears the update cooldown.
    pub fn reset_cooldown(&mut self) {
        info!(
            was_remaining = ?self.cooldown.remaining(),
            "Resetting update cooldown"
        );
        self.cooldown.reset();
    }

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            dry_run: self.operator.is_dry_run(),
            cycles: self.cycles,
            cooldown_active: self.cooldown.is_active(),
            cooldown_remaining_secs: self.cooldown.remaining().as_secs(),
            undesired: self.undesired.status(Instant::now()),
            last_cycle: self.last_cycle.clone(),
        }
    }

    /// Runs one cycle and records its outcome. Errors are logged, not returned.
    pub async fn tick(&mut self) {
        info!("*tick*");
        info!(
            remaining = ?self.cooldown.remaining(),
            "Time until update cooldown resets"
        );

        let outcome = match self.reconcile().await {
            Ok(report) => CycleOutcome::Succeeded {
                finished_at: Utc::now(),
                report,
            },
            Err(e) => {
                error!(error = %e, "Reconcile cycle failed");
                CycleOutcome::Failed {
                    finished_at: Utc::now(),
                    error: e.to_string(),
                }
            }
        };

        self.cycles += 1;
        self.last_cycle = Some(outcome);
    }

    /// Performs a single reconcile cycle.
    #[instrument(skip(self), fields(cycle = self.cycles + 1))]
    pub async fn reconcile(&mut self) -> Result<CycleReport> {
        let mut report = CycleReport::default();

        let machines = self.active_machines(&mut report).await?;
        if machines.is_empty() {
            return Err(ReconcileError::NoMachines);
        }

        let desired: Vec<Unit> = machines
            .iter()
            .map(|m| Unit::for_machine(&self.config.unit_prefix, &m.id))
            .collect();

        let managed = self.managed_units(&mut report).await?;
        let diff = diff_units(&desired, &managed)?;
        debug!(
            new = diff.new.len(),
            active = diff.active.len(),
            undesired = diff.undesired.len(),
            "Diffed units"
        );

        self.stats.new_units(diff.new.len());
        for unit in &diff.new {
            self.create(unit).await?;
            report.created.push(unit.name.clone());
        }

        self.check_active_units(&diff.active, &mut report).await?;

        // A misplaced unit shares its name with a desired unit; the drift
        // check above owns it, so it never enters the tracker.
        let undesired: Vec<Unit> = diff
            .undesired
            .into_iter()
            .filter(|u| !desired.iter().any(|d| d.name == u.name))
            .collect();
        self.update_undesired(&desired, &managed, &undesired, &mut report)
            .await?;

        info!(
            created = report.created.len(),
            updated = report.updated.len(),
            skipped = report.skipped_cooldown.len(),
            deleted = report.deleted.len(),
            tracked = report.undesired_tracked,
            "Cycle complete"
        );
        Ok(report)
    }

    async fn active_machines(&self, report: &mut CycleReport) -> Result<Vec<Machine>> {
        let fleet = self.fleet.as_ref();
        let machines = retry(self.config.retry, move || fleet.machines())
            .await
            .map_err(ReconcileError::fleet("listing machines"))?;
        report.machines_total = machines.len();
        self.stats.seen_machines_total(machines.len());

        let active: Vec<Machine> = match self.config.machine_tag.as_deref() {
            Some(tag) => machines.into_iter().filter(|m| m.has_tag(tag)).collect(),
            None => machines,
        };

        report.machines_active = active.len();
        self.stats.seen_machines_active(active.len());
        Ok(active)
    }

    async fn managed_units(&self, report: &mut CycleReport) -> Result<Vec<Unit>> {
        let fleet = self.fleet.as_ref();
        let units = retry(self.config.retry, move || fleet.units())
            .await
            .map_err(ReconcileError::fleet("listing units"))?;

        let managed: Vec<Unit> = units
            .iter()
            .filter(|u| u.name.has_prefix(&self.config.unit_prefix))
            .map(|u| Unit {
                name: u.name.clone(),
                machine_id: u.machine_id.clone().unwrap_or_else(|| MachineId::new("")),
            })
            .collect();

        report.units_total = units.len();
        report.units_managed = managed.len();
        self.stats.seen_units_total(units.len());
        self.stats.seen_units_managed(managed.len());
        Ok(managed)
    }

    fn render(&self, unit: &Unit) -> OptionSet {
        self.config.template.render(&unit.machine_id)
    }

    async fn create(&self, unit: &Unit) -> Result<()> {
        let options = self.render(unit);
        self.operator
            .create_unit(&unit.name, &options)
            .await
            .map_err(ReconcileError::operator("create", &unit.name))
    }

    async fn fetch_unit(&self, name: &UnitName) -> Result<Option<FleetUnit>> {
        let fleet = self.fleet.as_ref();
        retry(self.config.retry, move || fleet.unit(name))
            .await
            .map_err(ReconcileError::fleet("fetching unit"))
    }

    async fn check_active_units(&mut self, active: &[Unit], report: &mut CycleReport) -> Result<()> {
        let mut update_required = 0;
        let mut no_update_required = 0;

        for unit in active {
            let desired = self.render(unit);

            let Some(live) = self.fetch_unit(&unit.name).await? else {
                warn!(unit = %unit.name, "Active unit vanished, creating it again");
                self.create(unit).await?;
                report.created.push(unit.name.clone());
                continue;
            };

            if desired.matches(&live.options, self.config.drift_comparison) {
                no_update_required += 1;
                continue;
            }

            update_required += 1;
            debug!(unit = %unit.name, "Unit definition drifted");
            match self.update_unit(unit, &desired).await? {
                UpdateOutcome::Updated => report.updated.push(unit.name.clone()),
                UpdateOutcome::SkippedCooldown => report.skipped_cooldown.push(unit.name.clone()),
            }
        }

        report.unchanged = no_update_required;
        self.stats.active_units_seen(active.len());
        self.stats.update_required(update_required);
        self.stats.no_update_required(no_update_required);
        Ok(())
    }

    async fn update_unit(&mut self, unit: &Unit, options: &OptionSet) -> Result<UpdateOutcome> {
        if self.cooldown.is_active() {
            info!(
                unit = %unit.name,
                remaining = ?self.cooldown.remaining(),
                "Ignoring update due to cooldown"
            );
            self.stats.update_skipped_cooldown(unit);
            return Ok(UpdateOutcome::SkippedCooldown);
        }

        info!(unit = %unit.name, "Updating unit");
        self.operator
            .destroy_unit(&unit.name)
            .await
            .map_err(ReconcileError::operator("destroy", &unit.name))?;
        self.cooldown.stamp();

        tokio::time::sleep(self.config.update_settle_time).await;

        self.operator
            .create_unit(&unit.name, options)
            .await
            .map_err(ReconcileError::operator("re-create", &unit.name))?;
        Ok(UpdateOutcome::Updated)
    }

    async fn update_undesired(
        &mut self,
        desired: &[Unit],
        managed: &[Unit],
        undesired: &[Unit],
        report: &mut CycleReport,
    ) -> Result<()> {
        for name in self.undesired.revive(desired) {
            info!(unit = %name, "Undesired unit is desired again");
            self.stats.revived_undesired(&name);
            report.revived.push(name);
        }

        for name in self.undesired.retain_managed(managed) {
            info!(unit = %name, "Undesired unit removed outside the replicator, no longer tracking it");
            report.forgotten.push(name);
        }

        let now = Instant::now();
        for unit in undesired {
            match self.undesired.observe(unit, now) {
                Observation::NewlyUndesired => {
                    info!(
                        unit = %unit.name,
                        machine = %unit.machine_id,
                        delete_after = ?self.undesired.delete_after(),
                        "Unit became undesired"
                    );
                    self.stats.new_undesired(unit);
                    report.newly_undesired.push(unit.name.clone());
                }
                Observation::Pending { remaining } => {
                    debug!(unit = %unit.name, ?remaining, "Undesired unit within grace period");
                }
                Observation::Expired => {
                    info!(unit = %unit.name, "Destroying undesired unit");
                    self.operator
                        .destroy_unit(&unit.name)
                        .await
                        .map_err(ReconcileError::operator("destroy", &unit.name))?;
                    self.undesired.remove(&unit.name);
                    self.stats.deleted_undesired(unit);
                    report.deleted.push(unit.name.clone());
                }
            }
        }

        report.undesired_tracked = self.undesired.len();
        self.stats.undesired_units(self.undesired.len());
        Ok(())
    }
}

impl<F, O> Service<F, O>
where
    F: FleetApi + 'static,
    O: UnitOperator + 'static,
{
    /// Runs the event loop until shutdown.
    ///
    /// The first cycle starts immediately; later cycles follow the tick
    /// interval. Ticks missed while a cycle runs are skipped, not queued.
    pub async fn run(mut self, mut rx: mpsc::Receiver<ServiceMessage>, shutdown: CancellationToken) {
        info!(
            tick = ?self.config.tick_interval,
            delete_time = ?self.config.delete_time,
            cooldown = ?self.config.update_cooldown,
            dry_run = self.operator.is_dry_run(),
            "Replicator service started"
        );

        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }

                msg = rx.recv() => match msg {
                    Some(ServiceMessage::ResetCooldown) => self.reset_cooldown(),
                    Some(ServiceMessage::Status(reply)) => {
                        // The requester may have given up waiting.
                        let _ = reply.send(self.status());
                    }
                    Some(ServiceMessage::Shutdown) => {
                        info!("Shutdown message received");
                        break;
                    }
                    None => {
                        debug!("Control channel closed");
                        break;
                    }
                },

                _ = ticker.tick() => self.tick().await,
            }
        }

        info!(cycles = self.cycles, "Replicator service stopped");
    }

    /// Spawns the event loop on the current runtime.
    pub fn spawn(self, shutdown: CancellationToken) -> (ServiceHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(CONTROL_CHANNEL_CAPACITY);
        let task = tokio::spawn(self.run(rx, shutdown));
        (ServiceHandle::new(tx), task)
    }
}
