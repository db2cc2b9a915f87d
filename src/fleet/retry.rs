//! Bounded retry for fleet API calls.
//!
//! Every backend call made by the operator and the reconciler goes through
//! [`retry`]: a fixed number of extra attempts, a fixed delay apart. Only
//! transient errors are retried; permanent and not-found errors are returned
//! immediately.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use super::error::FleetApiError;

/// Retry policy for fleet API calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Extra attempts after the first one.
    pub max_retries: u32,

    /// Pause before each retry.
    pub delay: Duration,
}

impl RetryConfig {
    /// 3 retries, 2s apart.
    pub const DEFAULT: Self = Self::fixed(3, Duration::from_secs(2));

    /// Never retry.
    pub const NONE: Self = Self::fixed(0, Duration::ZERO);

    pub const fn fixed(max_retries: u32, delay: Duration) -> Self {
        RetryConfig { max_retries, delay }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Runs `operation`, retrying transient failures according to `config`.
///
/// Returns the last error once the retries are used up.
pub async fn retry<T, F, Fut>(config: RetryConfig, mut operation: F) -> Result<T, FleetApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FleetApiError>>,
{
    let mut attempt: u32 = 0;

    loop {
        let e = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        attempt += 1;

        if !e.kind.is_retriable() {
            return Err(e);
        }
        if attempt > config.max_retries {
            if config.max_retries > 0 {
                warn!(error = %e, attempts = attempt, "Giving up on fleet call");
            }
            return Err(e);
        }

        debug!(
            error = %e,
            attempt,
            delay_ms = config.delay.as_millis() as u64,
            "Transient fleet error, retrying"
        );
        tokio::time::sleep(config.delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::error::FleetErrorKind;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counting<T: Send + 'static>(
        counter: &Arc<AtomicU32>,
        outcome: impl Fn(u32) -> Result<T, FleetApiError>,
    ) -> impl FnMut() -> std::future::Ready<Result<T, FleetApiError>> {
        let counter = counter.clone();
        move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(outcome(n))
        }
    }

    #[test]
    fn default_is_three_retries_two_seconds_apart() {
        assert_eq!(RetryConfig::default(), RetryConfig::fixed(3, Duration::from_secs(2)));
    }

    #[tokio::test]
    async fn success_on_first_attempt() {
        let counter = Arc::new(AtomicU32::new(0));

        let result = retry(RetryConfig::DEFAULT, counting(&counter, |_| Ok(42))).await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn permanent_error_not_retried() {
        let counter = Arc::new(AtomicU32::new(0));

        let result = retry(
            RetryConfig::DEFAULT,
            counting(&counter, |_| {
                Err::<i32, _>(FleetApiError::permanent_without_source("bad request"))
            }),
        )
        .await;

        assert_eq!(result.unwrap_err().kind, FleetErrorKind::Permanent);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn not_found_not_retried() {
        let counter = Arc::new(AtomicU32::new(0));

        let result = retry(
            RetryConfig::DEFAULT,
            counting(&counter, |_| Err::<i32, _>(FleetApiError::not_found("unit x"))),
        )
        .await;

        assert!(result.unwrap_err().is_not_found());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_succeeds_on_third_attempt() {
        let counter = Arc::new(AtomicU32::new(0));
        let started = tokio::time::Instant::now();

        let result = retry(
            RetryConfig::DEFAULT,
            counting(&counter, |n| {
                if n < 2 {
                    Err(FleetApiError::transient_without_source("temporary failure"))
                } else {
                    Ok(42)
                }
            }),
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_exhausts_retries() {
        let config = RetryConfig::fixed(2, Duration::from_millis(100));
        let counter = Arc::new(AtomicU32::new(0));
        let started = tokio::time::Instant::now();

        let result = retry(
            config,
            counting(&counter, |_| {
                Err::<i32, _>(FleetApiError::transient_without_source("always fails"))
            }),
        )
        .await;

        assert_eq!(result.unwrap_err().kind, FleetErrorKind::Transient);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn none_config_tries_once() {
        let counter = Arc::new(AtomicU32::new(0));

        let result = retry(
            RetryConfig::NONE,
            counting(&counter, |_| {
                Err::<i32, _>(FleetApiError::transient_without_source("error"))
            }),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
