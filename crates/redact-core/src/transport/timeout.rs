//! Upload timeout sizing.

use std::time::Duration;

const BYTES_PER_GB: u64 = 1024 * 1024 * 1024;

/// Base timeout plus `per_gb` for every whole gigabyte of payload.
///
/// Payloads below 1 GiB get the base timeout only. Each completed GiB adds
/// one increment, so the timeout steps up at every GiB boundary.
pub fn upload_timeout(payload_bytes: u64, base: Duration, per_gb: Duration) -> Duration {
    let whole_gb = payload_bytes / BYTES_PER_GB;
    let increments = u32::try_from(whole_gb).unwrap_or(u32::MAX);
    base.saturating_add(per_gb.saturating_mul(increments))
}
