//! Cooperative cancellation for retry loops, poll loops and batch dispatch.
//!
//! A [`CancelToken`] is a shared flag. Long waits are cut into short slices
//! so a cancel request is noticed promptly even in the middle of a backoff
//! delay or a poll interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::retry::Clock;
use crate::{RedactError, Result};

/// Longest uninterrupted sleep between two cancellation checks.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Every clone of this token observes it.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Returns `Err(Cancelled)` once cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(RedactError::Cancelled);
        }
        Ok(())
    }

    /// Sleep for `total` on `clock`, waking early with `Err(Cancelled)`.
    pub fn sleep(&self, clock: &dyn Clock, total: Duration) -> Result<()> {
        let mut left = total;
        while !left.is_zero() {
            self.check()?;
            let slice = left.min(SLEEP_SLICE);
            clock.sleep(slice);
            left -= slice;
        }
        self.check()
    }
}
