use std::time::{SystemTime, UNIX_EPOCH};

pub fn utc_ns_now() -> u64 {
    let d = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    d.as_secs() * 1_000_000_000 + d.subsec_nanos() as u64
}

/// Age of `time` relative to now, zero for timestamps in the future.
pub fn age_secs(time: SystemTime) -> u64 {
    SystemTime::now()
        .duration_since(time)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
