//! Retry loop: run an attempt until success, budget exhaustion or cancel.

use super::classify::classify_curl_error;
use super::clock::Clock;
use super::error::AttemptError;
use super::policy::{BackoffState, RetryDecision, RetryPolicy};
use crate::cancel::CancelToken;

/// Runs `attempt` until it succeeds or the policy says to stop.
///
/// Curl failures of a retryable kind sleep for the backoff delay on `clock`
/// and try again; `Fatal` errors and non-retryable curl errors return at
/// once. Returns the last error when the budget is spent. Cancellation is
/// checked before every attempt and during every backoff sleep.
pub fn run_with_retry<T, F>(
    policy: &RetryPolicy,
    clock: &dyn Clock,
    cancel: &CancelToken,
    mut attempt: F,
) -> Result<T, AttemptError>
where
    F: FnMut() -> Result<T, AttemptError>,
{
    let mut state = BackoffState::new();
    loop {
        cancel.check()?;
        let (error, connected) = match attempt() {
            Ok(v) => return Ok(v),
            Err(AttemptError::Curl { error, connected }) => (error, connected),
            Err(fatal) => return Err(fatal),
        };
        let kind = classify_curl_error(&error);
        match policy.decide(&mut state, kind, clock.now()) {
            RetryDecision::NoRetry => {
                if kind.is_retryable() {
                    tracing::debug!(
                        retries = state.retries,
                        "retry budget exhausted after network error: {}",
                        error
                    );
                }
                return Err(AttemptError::Curl { error, connected });
            }
            RetryDecision::RetryAfter(d) => {
                tracing::debug!(
                    kind = ?kind,
                    retry = state.retries,
                    "network error '{}', retrying after {:.2}s",
                    error,
                    d.as_secs_f64()
                );
                cancel.sleep(clock, d)?;
            }
        }
    }
}
