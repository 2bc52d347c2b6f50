//! Progress watchdog for uploads, fed from libcurl's progress callback.
//!
//! While the body is being sent the transfer may not stall for longer than
//! `stall`. Once libcurl has handed over the whole body, the response has
//! `response_wait` to start and may not stall after that either.
//!
//! libcurl reports the body as sent once it sits in socket buffers, so the
//! server may still be reading it. One extra `stall` period covers that.

use std::time::{Duration, Instant};

/// Why the watchdog aborted a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Expired {
    /// Nothing moved while the body was still being sent.
    WhileSending,
    /// The body was sent but the response did not arrive in time.
    AwaitingResponse,
}

#[derive(Debug)]
pub(crate) struct UploadWatchdog {
    stall: Duration,
    response_wait: Duration,
    last_progress: Instant,
    uploaded: f64,
    downloaded: f64,
    sent_at: Option<Instant>,
    expired: Option<Expired>,
}

impl UploadWatchdog {
    pub(crate) fn new(stall: Duration, response_wait: Duration, now: Instant) -> Self {
        Self {
            stall,
            response_wait,
            last_progress: now,
            uploaded: 0.0,
            downloaded: 0.0,
            sent_at: None,
            expired: None,
        }
    }

    pub(crate) fn expired(&self) -> Option<Expired> {
        self.expired
    }

    /// Record one progress report. Returns false to abort the transfer.
    pub(crate) fn observe(
        &mut self,
        now: Instant,
        ul_total: f64,
        ul_now: f64,
        dl_now: f64,
        response_started: bool,
    ) -> bool {
        if ul_now > self.uploaded || dl_now > self.downloaded {
            self.uploaded = self.uploaded.max(ul_now);
            self.downloaded = self.downloaded.max(dl_now);
            self.last_progress = now;
        }
        if self.sent_at.is_none() && ul_total > 0.0 && ul_now >= ul_total {
            self.sent_at = Some(now);
        }
        let idle = now.saturating_duration_since(self.last_progress);
        self.expired = match self.sent_at {
            Some(sent) if !response_started => (now.saturating_duration_since(sent)
                > self.response_wait + self.stall)
                .then_some(Expired::AwaitingResponse),
            Some(_) => (idle > self.stall).then_some(Expired::AwaitingResponse),
            None => (idle > self.stall).then_some(Expired::WhileSending),
        };
        self.expired.is_none()
    }
}
