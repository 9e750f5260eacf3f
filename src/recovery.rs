use crate::config::SystemConfig;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Retry strategy configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryConfig {
    /// Total number of attempts, including the first
    pub max_attempts: u32,
    /// Delay after the first failure
    pub base_delay: Duration,
    /// Maximum delay between attempts
    pub max_delay: Duration,
    /// Double the delay after every failure
    pub exponential_backoff: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            exponential_backoff: true,
        }
    }
}

impl RecoveryConfig {
    /// Fixed-delay policy used for idle frame preparation
    pub fn idle_frame(config: &SystemConfig) -> Self {
        let delay = Duration::from_millis(config.idle_retry_delay_ms);
        Self {
            max_attempts: config.idle_retry_attempts.max(1),
            base_delay: delay,
            max_delay: delay,
            exponential_backoff: false,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if !self.exponential_backoff {
            return self.base_delay;
        }

        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .map(|delay| delay.min(self.max_delay))
            .unwrap_or(self.max_delay)
    }
}

/// Why a retried operation gave up
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("{component} failed after {attempts} attempts: {last}")]
    Exhausted {
        component: String,
        attempts: u32,
        last: E,
    },

    #[error("{component} retry cancelled by shutdown")]
    Cancelled { component: String },
}

/// Run `operation` until it succeeds, the attempts run out, or shutdown is
/// requested. The operation receives the 1-based attempt number. Waiting
/// between attempts ends early on shutdown.
pub async fn retry_with_backoff<T, E, F, Fut>(
    config: &RecoveryConfig,
    component: &str,
    shutdown: &CancellationToken,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        if shutdown.is_cancelled() {
            return Err(RetryError::Cancelled {
                component: component.to_string(),
            });
        }

        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    info!("{} recovered on attempt {}", component, attempt);
                }
                return Ok(value);
            }
            Err(e) if attempt >= max_attempts => {
                warn!(
                    "{} failed on final attempt {}/{}: {}",
                    component, attempt, max_attempts, e
                );
                return Err(RetryError::Exhausted {
                    component: component.to_string(),
                    attempts: attempt,
                    last: e,
                });
            }
            Err(e) => {
                let delay = config.delay_after(attempt);
                warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    component, attempt, max_attempts, e, delay
                );

                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("{} retry interrupted by shutdown", component);
                        return Err(RetryError::Cancelled {
                            component: component.to_string(),
                        });
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn fixed(attempts: u32, delay_ms: u64) -> RecoveryConfig {
        RecoveryConfig {
            max_attempts: attempts,
            base_delay: Duration::from_millis(delay_ms),
            max_delay: Duration::from_millis(delay_ms),
            exponential_backoff: false,
        }
    }

    #[test]
    fn test_delay_calculation() {
        let config = RecoveryConfig {
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            exponential_backoff: true,
        };
        assert_eq!(config.delay_after(1), Duration::from_secs(1));
        assert_eq!(config.delay_after(2), Duration::from_secs(2));
        assert_eq!(config.delay_after(3), Duration::from_secs(4));
        assert_eq!(config.delay_after(4), Duration::from_secs(5));
        assert_eq!(config.delay_after(40), Duration::from_secs(5));

        assert_eq!(fixed(3, 2000).delay_after(3), Duration::from_secs(2));
    }

    #[test]
    fn test_idle_frame_policy_from_system_config() {
        let system = crate::config::MotionplayConfig::default().system;
        let config = RecoveryConfig::idle_frame(&system);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay, Duration::from_millis(2000));
        assert!(!config.exponential_backoff);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_after_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let shutdown = CancellationToken::new();
        let start = Instant::now();

        let counter = Arc::clone(&calls);
        let result: Result<u32, RetryError<String>> =
            retry_with_backoff(&fixed(3, 2000), "idle", &shutdown, |attempt| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if attempt < 3 {
                        Err(format!("attempt {} failed", attempt))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_max_attempts() {
        let shutdown = CancellationToken::new();
        let result: Result<(), RetryError<&str>> =
            retry_with_backoff(&fixed(3, 10), "idle", &shutdown, |_| async { Err("nope") }).await;

        match result {
            Err(RetryError::Exhausted { attempts, last, .. }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last, "nope");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_stops_on_shutdown() {
        let shutdown = CancellationToken::new();
        let canceller = shutdown.clone();
        let start = Instant::now();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            canceller.cancel();
        });

        let result: Result<(), RetryError<&str>> =
            retry_with_backoff(&fixed(5, 10_000), "idle", &shutdown, |_| async { Err("nope") })
                .await;

        assert!(matches!(result, Err(RetryError::Cancelled { .. })));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
