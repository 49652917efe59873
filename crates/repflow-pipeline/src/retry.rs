//! Bounded retry with timeout for external capability calls.
//!
//! Every downloader/transcriber/analyzer/embedder invocation runs under an
//! individual timeout and up to three attempts with exponential backoff.
//! Only retryable errors (and timeouts) re-attempt; validation failures and
//! duplicates surface immediately.

use std::future::Future;
use std::time::Duration;

use repflow_core::AppError;

use crate::cancel::CancelToken;

pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Backoff before retry `attempt` (0-based): 1s, 2s, 4s.
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.min(4))
}

pub async fn retry_with_timeout<T, F, Fut>(
    op_name: &str,
    attempts: u32,
    timeout: Duration,
    cancel: &CancelToken,
    mut f: F,
) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut last_err = AppError::Internal(format!("{}: no attempts made", op_name));
    for attempt in 0..attempts.max(1) {
        cancel.check()?;
        if attempt > 0 {
            tokio::time::sleep(backoff_delay(attempt - 1)).await;
            cancel.check()?;
            tracing::info!(op = op_name, attempt = attempt + 1, "Retrying");
        }

        match tokio::time::timeout(timeout, f()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => {
                if !err.is_retryable() {
                    return Err(err);
                }
                tracing::warn!(op = op_name, attempt = attempt + 1, error = %err, "Attempt failed");
                last_err = err;
            }
            Err(_) => {
                tracing::warn!(op = op_name, attempt = attempt + 1, timeout_secs = timeout.as_secs(), "Attempt timed out");
                last_err = AppError::Internal(format!(
                    "{} timed out after {}s",
                    op_name,
                    timeout.as_secs()
                ));
            }
        }
    }
    Err(last_err)
}
