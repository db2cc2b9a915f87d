//! Command-line configuration.
//!
//! Every flag has an environment fallback (`REPLICATOR_*`). Durations use
//! humantime syntax (`60s`, `15m`, `1h`). The configuration is validated once
//! at startup and never changes afterwards.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};
use thiserror::Error;
use tracing::warn;

use crate::fleet::RetryConfig;
use crate::operator::WaitConfig;
use crate::service::ReplicatorConfig;
use crate::template::{TemplateError, UnitTemplate};
use crate::types::DriftComparison;

/// Default fleet API endpoint.
pub const DEFAULT_FLEET_ENDPOINT: &str = "http://127.0.0.1:49153";

/// Keeps one unit per fleet machine, created from a template.
#[derive(Debug, Parser)]
#[command(name = "fleet-unit-replicator", version, about, long_about = None)]
pub struct Cli {
    /// Interval between reconcile cycles
    #[arg(long, env = "REPLICATOR_TICKER_TIME", default_value = "60s", value_parser = humantime::parse_duration)]
    pub ticker_time: Duration,

    /// How long a unit must stay undesired before it is destroyed
    #[arg(long, env = "REPLICATOR_DELETE_TIME", default_value = "60m", value_parser = humantime::parse_duration)]
    pub delete_time: Duration,

    /// Minimum time between two unit updates, cluster-wide
    #[arg(long, env = "REPLICATOR_UPDATE_COOLDOWN_TIME", default_value = "15m", value_parser = humantime::parse_duration)]
    pub update_cooldown_time: Duration,

    /// Only machines carrying this metadata key get a unit (empty: all machines)
    #[arg(long, env = "REPLICATOR_MACHINE_TAG", default_value = "")]
    pub machine_tag: String,

    /// Prefix of every managed unit name
    #[arg(long, env = "REPLICATOR_UNIT_PREFIX")]
    pub unit_prefix: String,

    /// Unit file contents, or `@path` to read them from a file
    #[arg(long, env = "REPLICATOR_UNIT_TEMPLATE")]
    pub unit_template: String,

    /// Log actions instead of performing them
    #[arg(long, env = "REPLICATOR_DRY_RUN", default_value_t = true, action = ArgAction::Set)]
    pub dry_run: bool,

    /// Base URL of the fleet API
    #[arg(long, env = "REPLICATOR_FLEET_ENDPOINT", default_value = DEFAULT_FLEET_ENDPOINT)]
    pub fleet_endpoint: String,

    /// Pause between destroying a drifted unit and creating it again
    #[arg(long, env = "REPLICATOR_UPDATE_SETTLE_TIME", default_value = "15s", value_parser = humantime::parse_duration)]
    pub update_settle_time: Duration,

    /// Give up waiting for a unit to start or stop after this long (0s: never)
    #[arg(long, env = "REPLICATOR_STATE_WAIT_TIMEOUT", default_value = "10m", value_parser = humantime::parse_duration)]
    pub state_wait_timeout: Duration,

    /// How unit definitions are compared: `strict` or `subset`
    #[arg(long, env = "REPLICATOR_DRIFT_COMPARISON", default_value = "strict")]
    pub drift_comparison: DriftComparison,

    /// Retries of a failed fleet request
    #[arg(long, env = "REPLICATOR_RETRY_ATTEMPTS", default_value_t = 3)]
    pub retry_attempts: u32,

    /// Delay between retries of a failed fleet request
    #[arg(long, env = "REPLICATOR_RETRY_DELAY", default_value = "2s", value_parser = humantime::parse_duration)]
    pub retry_delay: Duration,

    /// Address for the HTTP control surface (disabled if unset)
    #[arg(long, env = "REPLICATOR_LISTEN")]
    pub listen: Option<SocketAddr>,
}

/// Errors in the startup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("--unit-prefix must not be empty")]
    EmptyPrefix,

    #[error("--ticker-time must be greater than zero")]
    ZeroTickInterval,

    #[error("unsupported fleet endpoint {0:?}: only http:// and https:// are supported")]
    UnsupportedEndpoint(String),

    #[error("failed to read unit template {path}: {source}")]
    ReadTemplate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid unit template: {0}")]
    Template(#[from] TemplateError),
}

/// Validated settings for the whole process.
#[derive(Debug, Clone)]
pub struct Settings {
    pub replicator: ReplicatorConfig,
    pub fleet_endpoint: String,
    pub dry_run: bool,

    /// Retry policy for fleet requests, shared by the service and the operator.
    pub retry: RetryConfig,

    pub wait: WaitConfig,
    pub listen: Option<SocketAddr>,
}

impl Cli {
    /// Validates the arguments and loads the unit template.
    pub fn into_settings(self) -> Result<Settings, ConfigError> {
        if self.unit_prefix.trim().is_empty() {
            return Err(ConfigError::EmptyPrefix);
        }
        if self.ticker_time.is_zero() {
            return Err(ConfigError::ZeroTickInterval);
        }
        validate_endpoint(&self.fleet_endpoint)?;

        let template = UnitTemplate::parse(&load_template(&self.unit_template)?)?;

        let machine_tag = match self.machine_tag.trim() {
            "" => {
                warn!("No machine tag set, every machine in the cluster gets a unit");
                None
            }
            tag => Some(tag.to_string()),
        };

        let retry = RetryConfig::fixed(self.retry_attempts, self.retry_delay);

        let replicator = ReplicatorConfig {
            tick_interval: self.ticker_time,
            delete_time: self.delete_time,
            update_cooldown: self.update_cooldown_time,
            update_settle_time: self.update_settle_time,
            machine_tag,
            unit_prefix: self.unit_prefix,
            template,
            drift_comparison: self.drift_comparison,
            retry,
        };

        Ok(Settings {
            replicator,
            fleet_endpoint: self.fleet_endpoint,
            dry_run: self.dry_run,
            retry,
            wait: WaitConfig::new().with_timeout(self.state_wait_timeout),
            listen: self.listen,
        })
    }
}

/// Resolves `@path` to the file contents; anything else is the template itself.
pub fn load_template(arg: &str) -> Result<String, ConfigError> {
    match arg.strip_prefix('@') {
        Some(path) => {
            let path = PathBuf::from(path);
            std::fs::read_to_string(&path).map_err(|source| ConfigError::ReadTemplate { path, source })
        }
        None => Ok(arg.to_string()),
    }
}

fn validate_endpoint(endpoint: &str) -> Result<(), ConfigError> {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::UnsupportedEndpoint(endpoint.to_string()))
    }
}
