use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the epoch, the unit lock expiries are carried in (spec §6).
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs()
}
