//! Waiting for a unit to settle into an activation state.
//!
//! fleet reports systemd state with some lag, and a unit can flap through
//! `active` before failing. The wait therefore requires a streak of
//! consecutive matching polls rather than a single match:
//!
//! - **Poll interval**: 500ms between polls
//! - **Streak**: 5 consecutive matching polls
//! - **Timeout**: 10 minutes by default; `None` waits forever
//!
//! A poll where the unit is missing from the state listing counts toward the
//! streak. A poll where it is present in any other state resets the streak.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

use crate::fleet::{FleetApi, RetryConfig, retry};
use crate::types::{ActivationState, UnitName};

use super::OperatorError;

/// Default interval between state polls (500ms).
const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Default number of consecutive matching polls.
const DEFAULT_REQUIRED_STREAK: u32 = 5;

/// Default upper bound on a single wait (10 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Configuration for activation-state waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    /// Interval between polls.
    pub poll_interval: Duration,

    /// Consecutive matching polls needed before the wait succeeds.
    pub required_streak: u32,

    /// Give up after this long. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitConfig {
    pub fn new() -> Self {
        WaitConfig {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            required_streak: DEFAULT_REQUIRED_STREAK,
            timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
        }
    }

    /// Sets the timeout; a zero duration means wait forever.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }
}

/// Polls fleet until `unit` has been in one of `targets` (or absent) for
/// `required_streak` consecutive polls.
pub async fn wait_for_activation_state<F: FleetApi>(
    fleet: &F,
    retry_config: RetryConfig,
    config: &WaitConfig,
    unit: &UnitName,
    targets: &[ActivationState],
) -> Result<(), OperatorError> {
    let started = Instant::now();
    let polling = poll_until_settled(fleet, retry_config, config, unit, targets);

    let result = match config.timeout {
        Some(limit) => match tokio::time::timeout(limit, polling).await {
            Ok(result) => result,
            Err(_) => {
                return Err(OperatorError::Timeout {
                    unit: unit.clone(),
                    expected: describe(targets),
                    waited: started.elapsed(),
                });
            }
        },
        None => polling.await,
    };

    if result.is_ok() {
        debug!(
            unit = %unit,
            expected = %describe(targets),
            waited_ms = started.elapsed().as_millis() as u64,
            "Unit settled"
        );
    }
    result
}

async fn poll_until_settled<F: FleetApi>(
    fleet: &F,
    retry_config: RetryConfig,
    config: &WaitConfig,
    unit: &UnitName,
    targets: &[ActivationState],
) -> Result<(), OperatorError> {
    let mut streak = 0u32;

    loop {
        let states = retry(retry_config, move || fleet.unit_states()).await?;
        let current = states
            .iter()
            .find(|s| &s.name == unit)
            .map(|s| s.active_state);

        match current {
            Some(state) if !targets.contains(&state) => {
                if streak > 0 {
                    trace!(unit = %unit, %state, "Streak reset");
                }
                streak = 0;
            }
            _ => streak += 1,
        }

        trace!(unit = %unit, state = ?current, streak, "Polled unit state");

        if streak >= config.required_streak {
            return Ok(());
        }

        tokio::time::sleep(config.poll_interval).await;
    }
}

fn describe(targets: &[ActivationState]) -> String {
    targets
        .iter()
        .map(ActivationState::to_string)
        .collect::<Vec<_>>()
        .join("|")
}
