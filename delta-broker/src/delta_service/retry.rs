use rand::{rng, Rng};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Backoff policy for the long-running follow loops.
#[derive(Debug, Clone)]
pub(crate) struct RetryManager {
    base_backoff_ms: u64,
    max_backoff_ms: u64,
}

impl RetryManager {
    pub(crate) fn new(base_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            base_backoff_ms: if base_backoff_ms == 0 {
                200
            } else {
                base_backoff_ms
            },
            max_backoff_ms: if max_backoff_ms == 0 {
                5_000
            } else {
                max_backoff_ms
            },
        }
    }

    /// Calculate linear backoff with jitter
    pub(crate) fn calculate_backoff(&self, attempt: usize) -> Duration {
        // Linear backoff: base * (attempt + 1), capped at max
        let linear = self.base_backoff_ms.saturating_mul(attempt as u64 + 1);
        let backoff = linear.min(self.max_backoff_ms);
        let jitter = rng().random_range(backoff / 2..=backoff); // 50-100% jitter
        Duration::from_millis(jitter)
    }
}

/// Runs `job` until it succeeds, `on_error` classifies a failure as fatal,
/// or `cancel` fires. Retries never give up on their own; the backoff stays
/// at its cap for as long as the failures last.
///
/// Cancellation is reported as `Ok(())`.
pub(crate) async fn retry_until<F, Fut, E, P>(
    name: &str,
    retry: &RetryManager,
    cancel: &CancellationToken,
    mut job: F,
    mut on_error: P,
) -> Result<(), E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
    P: FnMut(&E) -> bool,
{
    let mut attempt = 0usize;
    loop {
        let outcome = tokio::select! {
            _ = cancel.cancelled() => {
                info!(task = %name, "stopped");
                return Ok(());
            }
            outcome = job() => outcome,
        };

        let err = match outcome {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };
        if !on_error(&err) {
            warn!(task = %name, error = %err, "giving up on non-retryable error");
            return Err(err);
        }

        let backoff = retry.calculate_backoff(attempt);
        attempt = attempt.saturating_add(1);
        warn!(
            task = %name,
            attempt,
            backoff_ms = backoff.as_millis() as u64,
            error = %err,
            "retrying"
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                info!(task = %name, "stopped");
                return Ok(());
            }
            _ = tokio::time::sleep(backoff) => {}
        }
    }
}
