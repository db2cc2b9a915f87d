//! The operator that actually mutates fleet.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::fleet::{FleetApi, RetryConfig, retry};
use crate::types::{ActivationState, OptionSet, TargetState, UnitName};

use super::wait::{WaitConfig, wait_for_activation_state};
use super::{OperatorError, UnitOperator};

/// Read-write operator.
///
/// Every fleet call is retried per `retry`; every state change is followed by
/// a wait for the unit to settle.
#[derive(Debug)]
pub struct FleetOperator<F> {
    fleet: Arc<F>,
    retry: RetryConfig,
    wait: WaitConfig,
}

impl<F: FleetApi> FleetOperator<F> {
    pub fn new(fleet: Arc<F>, retry: RetryConfig, wait: WaitConfig) -> Self {
        FleetOperator { fleet, retry, wait }
    }

    async fn wait_for(
        &self,
        name: &UnitName,
        targets: &[ActivationState],
    ) -> Result<(), OperatorError> {
        wait_for_activation_state(self.fleet.as_ref(), self.retry, &self.wait, name, targets).await
    }
}

impl<F: FleetApi> UnitOperator for FleetOperator<F> {
    #[instrument(skip(self, options), fields(unit = %name))]
    async fn create_unit(&self, name: &UnitName, options: &OptionSet) -> Result<(), OperatorError> {
        info!(options = options.len(), "Creating unit");
        retry(self.retry, move || {
            self.fleet.create_unit(name, options, TargetState::Launched)
        })
        .await?;

        self.wait_for(name, ActivationState::RUNNING).await?;
        info!("Unit is running");
        Ok(())
    }

    #[instrument(skip(self), fields(unit = %name))]
    async fn destroy_unit(&self, name: &UnitName) -> Result<(), OperatorError> {
        info!("Stopping unit");
        match retry(self.retry, move || {
            self.fleet.set_unit_target_state(name, TargetState::Loaded)
        })
        .await
        {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!("Unit already gone");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        self.wait_for(name, ActivationState::STOPPED).await?;

        match retry(self.retry, move || self.fleet.destroy_unit(name)).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => debug!("Unit vanished before destroy"),
            Err(e) => return Err(e.into()),
        }

        info!("Unit destroyed");
        Ok(())
    }
}
