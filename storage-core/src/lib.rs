//! Storage-plane core (spec §2): wires the object-store client (A), the
//! distributed lock service (B), the reference tracker (C), the in-process
//! volume locks (D), the task controller (E), reconciliation workflows (F),
//! and the health checker (G) into a single process.

mod cli;
mod config;
mod driver;
mod error;

pub use cli::Cli;
pub use config::Config;
pub use driver::StorageCore;
pub use error::CoreError;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use objectstore::InMemoryBackend;
    use std::path::PathBuf;
    use std::sync::Arc;
    use storage_reconcile::{Action, Credentials, JournalKind, Phase, ReconcileObject};

    struct FakeObject {
        id: String,
        phase: Phase,
        deletion_timestamp: Option<DateTime<Utc>>,
        finalizers: Vec<String>,
    }

    impl ReconcileObject for FakeObject {
        fn stable_id(&self) -> String {
            self.id.clone()
        }
        fn phase(&self) -> Phase {
            self.phase
        }
        fn set_phase(&mut self, phase: Phase) {
            self.phase = phase;
        }
        fn deletion_timestamp(&self) -> Option<DateTime<Utc>> {
            self.deletion_timestamp
        }
        fn finalizers(&self) -> &[String] {
            &self.finalizers
        }
        fn add_finalizer(&mut self, name: &str) {
            if !self.finalizers.iter().any(|f| f == name) {
                self.finalizers.push(name.to_string());
            }
        }
        fn remove_finalizer(&mut self, name: &str) {
            self.finalizers.retain(|f| f != name);
        }
    }

    fn test_config() -> Config {
        Config {
            pool: "rbd".to_string(),
            client_path: PathBuf::from("/bin/true"),
            lock_owner: "storage-core-test".to_string(),
            monitors: vec!["10.0.0.1:6789".to_string()],
            keyfile: None,
            trash_purge_interval_secs: 3600,
            health_interval_secs: 60,
            health_timeout_secs: 15,
        }
    }

    #[tokio::test]
    async fn backup_then_journal_regen_reach_done() {
        let core = StorageCore::with_static_credentials(
            test_config(),
            Arc::new(InMemoryBackend::new()),
            Credentials {
                id: "admin".to_string(),
                secret: "secret".to_string(),
                keyfile: None,
                monitors: vec!["10.0.0.1:6789".to_string()],
            },
        );

        let mut object = FakeObject {
            id: "ns/vol-1".to_string(),
            phase: Phase::Initial,
            deletion_timestamp: None,
            finalizers: Vec::new(),
        };
        let action = core.reconcile_backup(&mut object).await;
        assert!(matches!(action, Action::Requeue(_)));

        for _ in 0..100 {
            if core.tasks.get("ns/vol-1").await.map(|j| !j.running()).unwrap_or(true) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        let action = core.reconcile_backup(&mut object).await;
        assert_eq!(action, Action::Await);
        assert_eq!(object.phase(), Phase::Done);

        let mut journal_object = FakeObject {
            id: "vol-1".to_string(),
            phase: Phase::Initial,
            deletion_timestamp: None,
            finalizers: Vec::new(),
        };
        let action = core.reconcile_journal_regen(JournalKind::Volume, &mut journal_object).await;
        assert_eq!(action, Action::Await);
        assert_eq!(journal_object.phase(), Phase::Done);
    }

    #[tokio::test]
    async fn health_check_reports_not_found_until_started() {
        let core = StorageCore::with_static_credentials(
            test_config(),
            Arc::new(InMemoryBackend::new()),
            Credentials {
                id: "admin".to_string(),
                secret: "secret".to_string(),
                keyfile: None,
                monitors: vec![],
            },
        );
        assert!(core.is_healthy("vol-2").await.is_err());

        let dir = std::env::temp_dir().join("storage-core-health-test");
        std::fs::create_dir_all(&dir).unwrap();
        core.start_health_check("vol-2", dir.clone()).await;
        assert!(core.is_healthy("vol-2").await.is_ok());
        core.stop_health_check("vol-2").await;
        let _ = std::fs::remove_dir_all(dir);
    }
}
