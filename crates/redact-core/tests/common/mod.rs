#![allow(dead_code)]

pub mod mock_server;

use std::sync::Arc;
use std::time::Duration;

use redact_core::retry::{ManualClock, RetryPolicy};
use redact_core::transport::{Transport, TransportConfig};

/// Transport on a manual clock: backoff and poll sleeps return at once.
pub fn fast_transport(retry_budget: Duration) -> (Arc<Transport>, Arc<ManualClock>) {
    transport_with_base_timeout(Duration::from_secs(10), retry_budget)
}

/// Like [`fast_transport`] with a custom stall/base timeout.
pub fn transport_with_base_timeout(
    base_timeout: Duration,
    retry_budget: Duration,
) -> (Arc<Transport>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let config = TransportConfig {
        connect_timeout: Duration::from_secs(5),
        base_timeout,
        retry: RetryPolicy {
            initial_delay: Duration::from_secs(1),
            total_time_limit: retry_budget,
        },
        ..TransportConfig::default()
    };
    let transport = Transport::new(config).with_clock(clock.clone());
    (Arc::new(transport), clock)
}
