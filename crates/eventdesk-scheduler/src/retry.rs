use std::future::Future;
use std::time::Duration;

use eventdesk_core::config::DEFAULT_RETRY_DELAYS_MS;
use tracing::{info, warn};

use crate::error::DeliveryError;

/// Result of driving one delivery through the retrier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    Delivered { attempt: u32, result: T },
    /// Every attempt failed, or one failed permanently. Carries the last error.
    Exhausted { attempts: u32, error: DeliveryError },
}

impl<T> RetryOutcome<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, RetryOutcome::Delivered { .. })
    }
}

/// Fixed-schedule retry policy for report delivery.
///
/// One attempt per configured delay; the delay is waited out *before* the
/// attempt, so the first attempt also starts after `delays[0]`.
#[derive(Debug, Clone)]
pub struct DeliveryRetrier {
    delays: Vec<Duration>,
}

impl Default for DeliveryRetrier {
    fn default() -> Self {
        Self::from_millis(&DEFAULT_RETRY_DELAYS_MS)
    }
}

impl DeliveryRetrier {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    pub fn from_millis(delays_ms: &[u64]) -> Self {
        Self::new(delays_ms.iter().copied().map(Duration::from_millis).collect())
    }

    pub fn max_attempts(&self) -> u32 {
        self.delays.len() as u32
    }

    /// Run `op` until it succeeds, fails permanently, or the schedule runs out.
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, DeliveryError>>,
    {
        let max = self.max_attempts();
        let mut last_error = DeliveryError::Transient("no delivery attempts configured".into());

        for (idx, delay) in self.delays.iter().enumerate() {
            let attempt = idx as u32 + 1;
            tokio::time::sleep(*delay).await;

            match op(attempt).await {
                Ok(result) => {
                    if attempt > 1 {
                        info!(attempt, "delivery succeeded after retry");
                    }
                    return RetryOutcome::Delivered { attempt, result };
                }
                Err(e) if !e.is_retryable() => {
                    warn!(attempt, error = %e, "delivery failed permanently; not retrying");
                    return RetryOutcome::Exhausted { attempts: attempt, error: e };
                }
                Err(e) => {
                    warn!(attempt, max_attempts = max, error = %e, "delivery attempt failed");
                    last_error = e;
                }
            }
        }

        RetryOutcome::Exhausted {
            attempts: max,
            error: last_error,
        }
    }
}
