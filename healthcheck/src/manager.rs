use crate::checker::{HealthChecker, DEFAULT_INTERVAL, DEFAULT_TIMEOUT};
use crate::error::HealthCheckError;
use scc::hash_map::Entry;
use scc::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

struct Registration {
    checker: Arc<HealthChecker>,
    shared_refs: usize,
}

/// Maps volume-id to its checker (spec §4.G). `start`/`stop` are exclusive:
/// a second `start` for the same id replaces the existing checker. The
/// shared variants let several mount paths for the same volume-id attach to
/// one checker; the path argument only matters for whichever caller creates
/// it, and the checker stays alive until every attached caller has called
/// `stop_shared`.
#[derive(Default)]
pub struct HealthManager {
    checkers: HashMap<String, Registration>,
}

impl HealthManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn start(&self, volume_id: &str, volume_path: PathBuf) {
        self.start_with(volume_id, volume_path, DEFAULT_INTERVAL, DEFAULT_TIMEOUT).await;
    }

    pub async fn start_with(&self, volume_id: &str, volume_path: PathBuf, interval: Duration, timeout: Duration) {
        self.stop(volume_id).await;
        let checker = HealthChecker::new(volume_path, interval, timeout);
        checker.start();
        let _ = self
            .checkers
            .insert_async(
                volume_id.to_string(),
                Registration {
                    checker,
                    shared_refs: 1,
                },
            )
            .await;
    }

    pub async fn stop(&self, volume_id: &str) {
        if let Some((_, registration)) = self.checkers.remove_async(volume_id).await {
            registration.checker.stop();
        }
    }

    /// `volume_path`/`interval`/`timeout` are only consulted for the first
    /// caller to attach for a given `volume_id`; later callers share the
    /// existing checker and their path argument is ignored.
    pub async fn start_shared(&self, volume_id: &str, volume_path: PathBuf, interval: Duration, timeout: Duration) {
        match self.checkers.entry_async(volume_id.to_string()).await {
            Entry::Occupied(mut occupied) => {
                occupied.get_mut().shared_refs += 1;
            }
            Entry::Vacant(vacant) => {
                let checker = HealthChecker::new(volume_path, interval, timeout);
                checker.start();
                vacant.insert_entry(Registration { checker, shared_refs: 1 });
            }
        }
    }

    /// Detaches one caller. Stops and removes the checker once its last
    /// attached caller has detached.
    pub async fn stop_shared(&self, volume_id: &str) {
        let exhausted = match self.checkers.entry_async(volume_id.to_string()).await {
            Entry::Occupied(mut occupied) => {
                occupied.get_mut().shared_refs = occupied.get().shared_refs.saturating_sub(1);
                occupied.get().shared_refs == 0
            }
            Entry::Vacant(_) => false,
        };
        if exhausted {
            self.stop(volume_id).await;
        }
    }

    pub async fn is_healthy(&self, volume_id: &str) -> Result<(bool, Option<String>), HealthCheckError> {
        let checker = self
            .checkers
            .read_async(volume_id, |_, registration| registration.checker.clone())
            .await
            .ok_or_else(|| HealthCheckError::NotFound(volume_id.to_string()))?;
        Ok(checker.is_healthy().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn tempdir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ceph-csi-healthmanager-test-{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn unregistered_volume_reports_not_found() {
        let manager = HealthManager::new();
        assert!(matches!(manager.is_healthy("missing").await, Err(HealthCheckError::NotFound(_))));
    }

    #[tokio::test]
    async fn start_then_stop_removes_the_checker() {
        let manager = HealthManager::new();
        let dir = tempdir("start-stop");
        manager.start_with("vol-1", dir.clone(), Duration::from_secs(60), Duration::from_secs(15)).await;
        assert!(manager.is_healthy("vol-1").await.is_ok());
        manager.stop("vol-1").await;
        assert!(manager.is_healthy("vol-1").await.is_err());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn shared_checker_survives_until_last_detach() {
        let manager = HealthManager::new();
        let dir = tempdir("shared");
        manager.start_shared("vol-2", dir.clone(), Duration::from_secs(60), Duration::from_secs(15)).await;
        manager.start_shared("vol-2", PathBuf::from("/ignored"), Duration::from_secs(1), Duration::from_secs(1)).await;

        manager.stop_shared("vol-2").await;
        assert!(manager.is_healthy("vol-2").await.is_ok(), "one attached caller remains");

        manager.stop_shared("vol-2").await;
        assert!(manager.is_healthy("vol-2").await.is_err(), "last caller detached");
        let _ = std::fs::remove_dir_all(dir);
    }
}
