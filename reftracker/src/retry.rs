use std::time::Duration;

/// Caller-owned retry budget for `Add`/`Remove` (spec §8 "avoid embedding
/// retry logic inside the object-store abstraction").
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
    fn default() -> Self {
        Self {
            max_attempts: 10,
            sleep: Duration::from_millis(50),
        }
    }
}
