//! An operator that logs instead of acting.

use tracing::info;

use crate::types::{OptionSet, UnitName};

use super::{OperatorError, UnitOperator};

/// Dry-run operator.
///
/// Never issues a fleet call. Used by default so a misconfigured replicator
/// can be observed before it is allowed to touch the cluster.
#[derive(Debug, Clone, Default)]
pub struct DryRunOperator;

impl DryRunOperator {
    pub fn new() -> Self {
        DryRunOperator
    }
}

impl UnitOperator for DryRunOperator {
    async fn create_unit(&self, name: &UnitName, options: &OptionSet) -> Result<(), OperatorError> {
        info!(unit = %name, options = options.len(), "dry-run: would create unit");
        Ok(())
    }

    async fn destroy_unit(&self, name: &UnitName) -> Result<(), OperatorError> {
        info!(unit = %name, "dry-run: would destroy unit");
        Ok(())
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}
