//! Creating and destroying single units.
//!
//! The reconciler decides *what* to create or destroy; an operator carries it
//! out. Two implementations exist and are chosen once at startup:
//!
//! - [`FleetOperator`] mutates fleet and waits for each unit to settle
//! - [`DryRunOperator`] only logs what it would have done
//!
//! [`Operator`] is the startup choice between them.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::fleet::{FleetApi, FleetApiError};
use crate::types::{OptionSet, UnitName};

mod dry_run;
mod fleet;
mod wait;

pub use dry_run::DryRunOperator;
pub use fleet::FleetOperator;
pub use wait::{WaitConfig, wait_for_activation_state};

/// Errors from operator actions.
#[derive(Debug, Error)]
pub enum OperatorError {
    /// A fleet call failed, after retries where retrying made sense.
    #[error(transparent)]
    Fleet(#[from] FleetApiError),

    /// The unit never settled into the expected state.
    #[error("timed out after {waited:?} waiting for {unit} to become {expected}")]
    Timeout {
        unit: UnitName,
        expected: String,
        waited: Duration,
    },
}

/// Performs unit lifecycle actions on behalf of the reconciler.
pub trait UnitOperator: Send + Sync {
    /// Creates `name` with the given definition and waits until it runs.
    fn create_unit(
        &self,
        name: &UnitName,
        options: &OptionSet,
    ) -> impl Future<Output = Result<(), OperatorError>> + Send;

    /// Stops `name`, waits until it is down, then removes it.
    fn destroy_unit(&self, name: &UnitName)
    -> impl Future<Output = Result<(), OperatorError>> + Send;

    /// Returns true if this operator never mutates fleet.
    fn is_dry_run(&self) -> bool {
        false
    }
}

/// The operator selected at startup.
#[derive(Debug)]
pub enum Operator<F> {
    ReadWrite(FleetOperator<F>),
    DryRun(DryRunOperator),
}

impl<F: FleetApi> UnitOperator for Operator<F> {
    async fn create_unit(&self, name: &UnitName, options: &OptionSet) -> Result<(), OperatorError> {
        match self {
            Operator::ReadWrite(op) => op.create_unit(name, options).await,
            Operator::DryRun(op) => op.create_unit(name, options).await,
        }
    }

    async fn destroy_unit(&self, name: &UnitName) -> Result<(), OperatorError> {
        match self {
            Operator::ReadWrite(op) => op.destroy_unit(name).await,
            Operator::DryRun(op) => op.destroy_unit(name).await,
        }
    }

    fn is_dry_run(&self) -> bool {
        matches!(self, Operator::DryRun(_))
    }
}
