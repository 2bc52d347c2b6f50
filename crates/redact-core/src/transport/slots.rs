//! Upload concurrency limit shared by every worker.
//!
//! Simultaneous large uploads slow the service gateway down, so at most
//! `max` multipart posts run at once regardless of worker count. Status,
//! download and delete calls never take a slot.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::Result;

const WAIT_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub struct UploadSlots {
    max: usize,
    in_use: Mutex<usize>,
    freed: Condvar,
}

impl UploadSlots {
    pub fn new(max: usize) -> Self {
        Self {
            max: max.max(1),
            in_use: Mutex::new(0),
            freed: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.max
    }

    pub fn in_use(&self) -> usize {
        *self.in_use.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Block until a slot is free. The slot is released when the guard drops.
    pub fn acquire(&self, cancel: &CancelToken) -> Result<SlotGuard<'_>> {
        let mut used = self.in_use.lock().unwrap_or_else(|e| e.into_inner());
        while *used >= self.max {
            cancel.check()?;
            used = self
                .freed
                .wait_timeout(used, WAIT_SLICE)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
        *used += 1;
        Ok(SlotGuard { slots: self })
    }

    fn release(&self) {
        let mut used = self.in_use.lock().unwrap_or_else(|e| e.into_inner());
        *used = used.saturating_sub(1);
        self.freed.notify_one();
    }
}

pub struct SlotGuard<'a> {
    slots: &'a UploadSlots,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.slots.release();
    }
}
