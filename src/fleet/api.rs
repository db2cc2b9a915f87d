//! The fleet capability surface consumed by the reconciler and the operator.
//!
//! The trait-based design enables:
//! - The HTTP client in production
//! - An in-memory fake that records calls in tests

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::types::{ActivationState, Machine, MachineId, OptionSet, TargetState, UnitName};

use super::error::FleetApiError;

/// A unit as fleet stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetUnit {
    pub name: UnitName,

    /// The machine fleet scheduled the unit on, if any.
    pub machine_id: Option<MachineId>,

    pub options: OptionSet,

    pub desired_state: Option<TargetState>,

    pub current_state: Option<TargetState>,
}

/// The live systemd state of a unit on its machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitState {
    pub name: UnitName,
    pub machine_id: Option<MachineId>,
    pub active_state: ActivationState,
}

/// Everything the replicator needs from fleet.
///
/// # Example (mock for testing)
///
/// ```ignore
/// struct EmptyFleet;
///
/// impl FleetApi for EmptyFleet {
///     async fn machines(&self) -> Result<Vec<Machine>, FleetApiError> {
///         Ok(vec![])
///     }
///     // ...
/// }
/// ```
pub trait FleetApi: Send + Sync {
    /// Lists every machine in the cluster.
    fn machines(&self) -> impl Future<Output = Result<Vec<Machine>, FleetApiError>> + Send;

    /// Lists every unit fleet knows about, managed by us or not.
    fn units(&self) -> impl Future<Output = Result<Vec<FleetUnit>, FleetApiError>> + Send;

    /// Fetches a single unit, or `None` if it does not exist.
    fn unit(
        &self,
        name: &UnitName,
    ) -> impl Future<Output = Result<Option<FleetUnit>, FleetApiError>> + Send;

    /// Submits a new unit with the given target state.
    fn create_unit(
        &self,
        name: &UnitName,
        options: &OptionSet,
        desired_state: TargetState,
    ) -> impl Future<Output = Result<(), FleetApiError>> + Send;

    /// Changes the target state of an existing unit.
    fn set_unit_target_state(
        &self,
        name: &UnitName,
        state: TargetState,
    ) -> impl Future<Output = Result<(), FleetApiError>> + Send;

    /// Removes a unit from fleet.
    fn destroy_unit(&self, name: &UnitName)
    -> impl Future<Output = Result<(), FleetApiError>> + Send;

    /// Lists the systemd state of every unit that has one.
    fn unit_states(&self) -> impl Future<Output = Result<Vec<UnitState>, FleetApiError>> + Send;
}
