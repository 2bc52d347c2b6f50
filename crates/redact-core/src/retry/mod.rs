//! Retry and backoff policy.
//!
//! Classifies libcurl failures (timeouts, connection drops, protocol
//! errors), computes the exponential backoff schedule against a total time
//! budget, and runs attempts until success, budget exhaustion or
//! cancellation. Application-level HTTP statuses are never retried here.

mod classify;
mod clock;
mod error;
mod policy;
mod run;

pub use classify::classify_curl_error;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::AttemptError;
pub use policy::{BackoffState, ErrorKind, RetryDecision, RetryPolicy};
pub use run::run_with_retry;
