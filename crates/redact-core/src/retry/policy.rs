use std::time::Duration;

use crate::config::RetryConfig;

/// High-level classification of an error for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation timed out (connect/read).
    Timeout,
    /// Network-level failure (connection refused or reset, DNS, etc.).
    Connection,
    /// Broken HTTP exchange (truncated body, malformed reply).
    Protocol,
    /// Anything else; never retried.
    Other,
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        !matches!(self, ErrorKind::Other)
    }
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Exponential backoff bounded by a total time budget.
///
/// The first retry waits `initial_delay`; each later one doubles the
/// previous delay. A delay never reaches past the budget: it is clamped to
/// whatever remains, so the last retry fires right at the deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    /// Measured from the first failure of a call.
    pub total_time_limit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            total_time_limit: Duration::from_secs(600),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            initial_delay: Duration::from_secs_f64(cfg.initial_delay_secs.max(0.0)),
            total_time_limit: Duration::from_secs(cfg.total_time_limit_secs),
        }
    }
}

impl RetryPolicy {
    /// Pure backoff step: `previous` is the last delay (None before the
    /// first retry), `elapsed` the time spent since the first failure.
    pub fn next_delay(&self, previous: Option<Duration>, elapsed: Duration) -> RetryDecision {
        let remaining = self.total_time_limit.saturating_sub(elapsed);
        if remaining.is_zero() {
            return RetryDecision::NoRetry;
        }
        let wanted = match previous {
            None => self.initial_delay,
            Some(prev) => prev.saturating_mul(2),
        };
        RetryDecision::RetryAfter(wanted.min(remaining))
    }

    /// Record a failure of kind `kind` observed at clock reading `now` and
    /// decide whether to try again.
    pub fn decide(&self, state: &mut BackoffState, kind: ErrorKind, now: Duration) -> RetryDecision {
        if !kind.is_retryable() {
            return RetryDecision::NoRetry;
        }
        let first = *state.first_failure.get_or_insert(now);
        let decision = self.next_delay(state.last_delay, now.saturating_sub(first));
        if let RetryDecision::RetryAfter(d) = decision {
            state.last_delay = Some(d);
            state.retries += 1;
        }
        decision
    }
}

/// Per-call retry bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackoffState {
    /// Retries granted so far.
    pub retries: u32,
    first_failure: Option<Duration>,
    last_delay: Option<Duration>,
}

impl BackoffState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time since the first failure, zero before any failure.
    pub fn elapsed(&self, now: Duration) -> Duration {
        self.first_failure
            .map(|first| now.saturating_sub(first))
            .unwrap_or_default()
    }
}
