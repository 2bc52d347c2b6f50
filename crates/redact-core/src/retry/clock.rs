//! Time source for backoff decisions, injectable so the policy can be
//! exercised without real sleeps.

use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub trait Clock: Send + Sync + fmt::Debug {
    /// Monotonic time since an arbitrary, fixed origin.
    fn now(&self) -> Duration;
    fn sleep(&self, d: Duration);
}

#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, d: Duration) {
        std::thread::sleep(d);
    }
}

/// Clock that only moves when slept on. Sleeping returns immediately.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_elapsed(&self) -> Duration {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Move time forward without recording a sleep (simulates slow calls).
    pub fn advance(&self, d: Duration) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) += d;
    }

    /// Every individual sleep requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now_elapsed()
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
        self.sleeps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(d);
    }
}
