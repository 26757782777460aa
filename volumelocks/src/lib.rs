//! In-process volume-operation lock table (spec §4.D). A plain presence set
//! guarded by a mutex: `try_acquire` inserts-if-absent, `release` removes.
//! No queueing, no blocking: a failed acquire is a caller's cue to requeue
//! upstream rather than wait here.

mod error;

pub use error::VolumeLockError;

use std::collections::HashSet;
use std::sync::Mutex;
use tracing::trace;

#[derive(Default)]
pub struct VolumeLocks {
    held: Mutex<HashSet<String>>,
}

impl VolumeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically inserts `id` if absent. Returns the already-in-progress
    /// error immediately rather than waiting.
    pub fn try_acquire(&self, id: &str) -> Result<(), VolumeLockError> {
        let mut held = self.held.lock().expect("volume lock table poisoned");
        if !held.insert(id.to_string()) {
            return Err(VolumeLockError::InProgress(id.to_string()));
        }
        trace!(id, "volume lock acquired");
        Ok(())
    }

    pub fn release(&self, id: &str) {
        let mut held = self.held.lock().expect("volume lock table poisoned");
        held.remove(id);
        trace!(id, "volume lock released");
    }

    /// `true` iff `id` is currently held. Intended for tests and diagnostics.
    pub fn is_held(&self, id: &str) -> bool {
        self.held.lock().expect("volume lock table poisoned").contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_on_same_id_fails() {
        let locks = VolumeLocks::new();
        locks.try_acquire("vol-1").unwrap();
        let err = locks.try_acquire("vol-1").unwrap_err();
        assert_eq!(err, VolumeLockError::InProgress("vol-1".to_string()));
    }

    #[test]
    fn release_then_acquire_succeeds() {
        let locks = VolumeLocks::new();
        locks.try_acquire("vol-1").unwrap();
        locks.release("vol-1");
        locks.try_acquire("vol-1").unwrap();
    }

    #[test]
    fn distinct_ids_do_not_contend() {
        let locks = VolumeLocks::new();
        locks.try_acquire("vol-1").unwrap();
        locks.try_acquire("vol-2").unwrap();
    }

    #[tokio::test]
    async fn concurrent_acquirers_only_one_wins() {
        use std::sync::Arc;
        let locks = Arc::new(VolumeLocks::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            handles.push(tokio::task::spawn_blocking(move || locks.try_acquire("vol-1").is_ok()));
        }
        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }
}
