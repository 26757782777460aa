use std::time::Duration;

/// Caller-owned retry budget for `try_acquire` (spec §4.B: the object-store
/// abstraction never retries on its own; contention loops live with the
/// caller).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub sleep: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, sleep: Duration) -> Self {
        Self {
            max_attempts,
            sleep,
        }
    }
}

impl Default for RetryPolicy {
    /// Ten attempts, 100ms apart: enough to ride out a version race between
    /// a handful of concurrent acquirers without holding a caller for long.
    fn default() -> Self {
        Self {
            max_attempts: 10,
            sleep: Duration::from_millis(100),
        }
    }
}
