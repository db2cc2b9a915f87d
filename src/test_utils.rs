//! Shared test utilities: arbitrary generators for property-based testing and
//! an in-memory fleet.

use std::collections::{BTreeMap, VecDeque};
use std::ops::Range;
use std::sync::Mutex;

use proptest::prelude::*;

use crate::fleet::{FleetApi, FleetApiError, FleetErrorKind, FleetUnit, UnitState};
use crate::stats::StatsCollector;
use crate::template::{FLEET_SECTION, MACHINE_ID_OPTION};
use crate::types::{
    ActivationState, Machine, MachineId, OptionSet, TargetState, Unit, UnitName, UnitOption,
};

// ─── Generators ───────────────────────────────────────────────────────────────

pub fn arb_machine_id() -> impl Strategy<Value = MachineId> {
    // Small alphabet so generated sets collide often.
    "m[0-5]".prop_map(MachineId)
}

pub fn arb_unit() -> impl Strategy<Value = Unit> {
    (arb_machine_id(), arb_machine_id()).prop_map(|(named_for, placed_on)| Unit {
        name: UnitName::for_machine("svc", &named_for),
        machine_id: placed_on,
    })
}

pub fn arb_units(size: Range<usize>) -> impl Strategy<Value = Vec<Unit>> {
    prop::collection::vec(arb_unit(), size)
}

pub fn arb_unit_option() -> impl Strategy<Value = UnitOption> {
    (
        prop_oneof![Just("Unit"), Just("Service"), Just("X-Fleet")],
        "[A-Z][a-z]{0,3}",
        "[a-z0-9/ ]{0,6}",
    )
        .prop_map(|(section, name, value)| UnitOption::new(section, name, value))
}

pub fn arb_option_set() -> impl Strategy<Value = OptionSet> {
    prop::collection::vec(arb_unit_option(), 0..6).prop_map(OptionSet)
}

// ─── Fake Fleet ───────────────────────────────────────────────────────────────

/// A mutating call received by [`FakeFleet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FleetCall {
    Create {
        name: UnitName,
        options: OptionSet,
        state: TargetState,
    },
    SetTargetState {
        name: UnitName,
        state: TargetState,
    },
    Destroy {
        name: UnitName,
    },
}

#[derive(Debug)]
struct ScriptedStates {
    upcoming: VecDeque<ActivationState>,
    then: ActivationState,
}

#[derive(Debug)]
struct FakeFleetState {
    machines: Vec<Machine>,
    units: BTreeMap<UnitName, FleetUnit>,
    states: BTreeMap<UnitName, ActivationState>,
    scripted: BTreeMap<UnitName, ScriptedStates>,
    activate_on_create: bool,

    mutations: Vec<FleetCall>,
    failed_mutations: usize,
    state_polls: usize,

    fail_mutations: Option<(usize, FleetErrorKind)>,
    fail_state_polls: Option<(usize, FleetErrorKind)>,
    fail_reads: Option<(usize, FleetErrorKind)>,
}

/// An in-memory fleet that records every mutation.
///
/// Created units become `active` immediately unless
/// [`set_activate_on_create(false)`](Self::set_activate_on_create) is called.
/// Retargeting to `loaded` makes a unit `inactive`.
#[derive(Debug)]
pub struct FakeFleet {
    state: Mutex<FakeFleetState>,
}

impl Default for FakeFleet {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeFleet {
    pub fn new() -> Self {
        FakeFleet {
            state: Mutex::new(FakeFleetState {
                machines: Vec::new(),
                units: BTreeMap::new(),
                states: BTreeMap::new(),
                scripted: BTreeMap::new(),
                activate_on_create: true,
                mutations: Vec::new(),
                failed_mutations: 0,
                state_polls: 0,
                fail_mutations: None,
                fail_state_polls: None,
                fail_reads: None,
            }),
        }
    }

    /// A fleet with one untagged machine per id.
    pub fn with_machines(ids: &[&str]) -> Self {
        let fleet = Self::new();
        for id in ids {
            fleet.add_machine(Machine::new(*id));
        }
        fleet
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeFleetState> {
        self.state.lock().unwrap()
    }

    pub fn add_machine(&self, machine: Machine) {
        self.lock().machines.push(machine);
    }

    pub fn remove_machine(&self, id: &str) {
        self.lock().machines.retain(|m| m.id.as_str() != id);
    }

    /// Adds a running unit as if someone had created it earlier.
    pub fn add_unit(&self, name: &UnitName, machine_id: Option<MachineId>, options: OptionSet) {
        let mut state = self.lock();
        state.units.insert(
            name.clone(),
            FleetUnit {
                name: name.clone(),
                machine_id,
                options,
                desired_state: Some(TargetState::Launched),
                current_state: Some(TargetState::Launched),
            },
        );
        state.states.insert(name.clone(), ActivationState::Active);
    }

    /// Deletes a unit without recording a mutation, as another fleet client would.
    pub fn remove_unit(&self, name: &UnitName) {
        let mut state = self.lock();
        state.units.remove(name);
        state.states.remove(name);
    }

    pub fn set_state(&self, name: &UnitName, active_state: ActivationState) {
        self.lock().states.insert(name.clone(), active_state);
    }

    /// Reports `upcoming` on successive polls, then `then` forever.
    pub fn script_states(
        &self,
        name: &UnitName,
        upcoming: Vec<ActivationState>,
        then: ActivationState,
    ) {
        self.lock().scripted.insert(
            name.clone(),
            ScriptedStates {
                upcoming: upcoming.into(),
                then,
            },
        );
    }

    pub fn set_activate_on_create(&self, activate: bool) {
        self.lock().activate_on_create = activate;
    }

    /// The next `count` mutating calls fail with `kind`.
    pub fn fail_next_mutations(&self, count: usize, kind: FleetErrorKind) {
        self.lock().fail_mutations = Some((count, kind));
    }

    /// The next `count` state listings fail with `kind`.
    pub fn fail_next_state_polls(&self, count: usize, kind: FleetErrorKind) {
        self.lock().fail_state_polls = Some((count, kind));
    }

    /// The next `count` machine, unit list or unit fetch calls fail with `kind`.
    pub fn fail_next_reads(&self, count: usize, kind: FleetErrorKind) {
        self.lock().fail_reads = Some((count, kind));
    }

    /// Successful or not-found mutations, in order. Injected failures are
    /// counted by [`failed_mutations`](Self::failed_mutations) instead.
    pub fn mutations(&self) -> Vec<FleetCall> {
        self.lock().mutations.clone()
    }

    pub fn clear_mutations(&self) {
        self.lock().mutations.clear();
    }

    pub fn creates(&self) -> Vec<UnitName> {
        self.lock()
            .mutations
            .iter()
            .filter_map(|c| match c {
                FleetCall::Create { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn destroys(&self) -> Vec<UnitName> {
        self.lock()
            .mutations
            .iter()
            .filter_map(|c| match c {
                FleetCall::Destroy { name } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn failed_mutations(&self) -> usize {
        self.lock().failed_mutations
    }

    pub fn state_polls(&self) -> usize {
        self.lock().state_polls
    }

    pub fn has_unit(&self, name: &UnitName) -> bool {
        self.lock().units.contains_key(name)
    }

    pub fn unit_names(&self) -> Vec<UnitName> {
        self.lock().units.keys().cloned().collect()
    }

    pub fn unit_options(&self, name: &UnitName) -> Option<OptionSet> {
        self.lock().units.get(name).map(|u| u.options.clone())
    }

    /// Replaces the stored definition of a unit, simulating drift.
    pub fn set_unit_options(&self, name: &UnitName, options: OptionSet) {
        if let Some(unit) = self.lock().units.get_mut(name) {
            unit.options = options;
        }
    }
}

fn take_failure(slot: &mut Option<(usize, FleetErrorKind)>) -> Option<FleetApiError> {
    let (remaining, kind) = slot.as_mut()?;
    if *remaining == 0 {
        *slot = None;
        return None;
    }
    *remaining -= 1;
    let kind = *kind;
    if *remaining == 0 {
        *slot = None;
    }
    Some(match kind {
        FleetErrorKind::Transient => FleetApiError::from_status(503, "injected"),
        FleetErrorKind::Permanent => FleetApiError::from_status(400, "injected"),
        FleetErrorKind::NotFound => FleetApiError::not_found("injected"),
    })
}

impl FakeFleetState {
    fn mutation_failure(&mut self) -> Result<(), FleetApiError> {
        match take_failure(&mut self.fail_mutations) {
            Some(e) => {
                self.failed_mutations += 1;
                Err(e)
            }
            None => Ok(()),
        }
    }

    fn read_failure(&mut self) -> Result<(), FleetApiError> {
        match take_failure(&mut self.fail_reads) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl FleetApi for FakeFleet {
    async fn machines(&self) -> Result<Vec<Machine>, FleetApiError> {
        let mut state = self.lock();
        state.read_failure()?;
        Ok(state.machines.clone())
    }

    async fn units(&self) -> Result<Vec<FleetUnit>, FleetApiError> {
        let mut state = self.lock();
        state.read_failure()?;
        Ok(state.units.values().cloned().collect())
    }

    async fn unit(&self, name: &UnitName) -> Result<Option<FleetUnit>, FleetApiError> {
        let mut state = self.lock();
        state.read_failure()?;
        Ok(state.units.get(name).cloned())
    }

    async fn create_unit(
        &self,
        name: &UnitName,
        options: &OptionSet,
        desired_state: TargetState,
    ) -> Result<(), FleetApiError> {
        let mut state = self.lock();
        state.mutation_failure()?;
        state.mutations.push(FleetCall::Create {
            name: name.clone(),
            options: options.clone(),
            state: desired_state,
        });

        let machine_id = options.get(FLEET_SECTION, MACHINE_ID_OPTION).map(MachineId::new);
        state.units.insert(
            name.clone(),
            FleetUnit {
                name: name.clone(),
                machine_id,
                options: options.clone(),
                desired_state: Some(desired_state),
                current_state: Some(desired_state),
            },
        );
        if state.activate_on_create && desired_state == TargetState::Launched {
            state.states.insert(name.clone(), ActivationState::Active);
        }
        Ok(())
    }

    async fn set_unit_target_state(
        &self,
        name: &UnitName,
        target: TargetState,
    ) -> Result<(), FleetApiError> {
        let mut state = self.lock();
        state.mutation_failure()?;
        state.mutations.push(FleetCall::SetTargetState {
            name: name.clone(),
            state: target,
        });

        let Some(unit) = state.units.get_mut(name) else {
            return Err(FleetApiError::not_found(format!("unit {}", name)));
        };
        unit.desired_state = Some(target);
        unit.current_state = Some(target);

        let active = match target {
            TargetState::Launched => ActivationState::Active,
            TargetState::Loaded | TargetState::Inactive => ActivationState::Inactive,
        };
        state.states.insert(name.clone(), active);
        Ok(())
    }

    async fn destroy_unit(&self, name: &UnitName) -> Result<(), FleetApiError> {
        let mut state = self.lock();
        state.mutation_failure()?;
        state.mutations.push(FleetCall::Destroy { name: name.clone() });

        state.states.remove(name);
        match state.units.remove(name) {
            Some(_) => Ok(()),
            None => Err(FleetApiError::not_found(format!("unit {}", name))),
        }
    }

    async fn unit_states(&self) -> Result<Vec<UnitState>, FleetApiError> {
        let mut state = self.lock();
        state.state_polls += 1;
        if let Some(e) = take_failure(&mut state.fail_state_polls) {
            return Err(e);
        }

        let mut current = state.states.clone();
        for (name, script) in state.scripted.iter_mut() {
            let next = script.upcoming.pop_front().unwrap_or(script.then);
            current.insert(name.clone(), next);
        }

        Ok(current
            .into_iter()
            .map(|(name, active_state)| UnitState {
                machine_id: state.units.get(&name).and_then(|u| u.machine_id.clone()),
                name,
                active_state,
            })
            .collect())
    }
}

// ─── Recording Stats ──────────────────────────────────────────────────────────

/// Stats collector that remembers the last value of every gauge and counts
/// every counter.
#[derive(Debug, Default)]
pub struct RecordingStats {
    gauges: Mutex<BTreeMap<&'static str, usize>>,
    counters: Mutex<BTreeMap<&'static str, Vec<UnitName>>>,
}

impl RecordingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gauge(&self, name: &str) -> Option<usize> {
        self.gauges.lock().unwrap().get(name).copied()
    }

    pub fn counter(&self, name: &str) -> Vec<UnitName> {
        self.counters
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    fn set(&self, name: &'static str, value: usize) {
        self.gauges.lock().unwrap().insert(name, value);
    }

    fn bump(&self, name: &'static str, unit: &UnitName) {
        self.counters
            .lock()
            .unwrap()
            .entry(name)
            .or_default()
            .push(unit.clone());
    }
}

impl StatsCollector for RecordingStats {
    fn seen_machines_total(&self, count: usize) {
        self.set("seen_machines_total", count);
    }

    fn seen_machines_active(&self, count: usize) {
        self.set("seen_machines_active", count);
    }

    fn seen_units_total(&self, count: usize) {
        self.set("seen_units_total", count);
    }

    fn seen_units_managed(&self, count: usize) {
        self.set("seen_units_managed", count);
    }

    fn new_units(&self, count: usize) {
        self.set("new_units", count);
    }

    fn active_units_seen(&self, count: usize) {
        self.set("active_units_seen", count);
    }

    fn update_required(&self, count: usize) {
        self.set("update_required", count);
    }

    fn no_update_required(&self, count: usize) {
        self.set("no_update_required", count);
    }

    fn update_skipped_cooldown(&self, unit: &Unit) {
        self.bump("update_skipped_cooldown", &unit.name);
    }

    fn new_undesired(&self, unit: &Unit) {
        self.bump("new_undesired", &unit.name);
    }

    fn revived_undesired(&self, name: &UnitName) {
        self.bump("revived_undesired", name);
    }

    fn deleted_undesired(&self, unit: &Unit) {
        self.bump("deleted_undesired", &unit.name);
    }

    fn undesired_units(&self, count: usize) {
        self.set("undesired_units", count);
    }
}
