//! Reconciliation workflows (spec §4.F): a uniform skeleton shared by
//! Backup, Restore, Trash-Purge, Journal-Regeneration (Volume and
//! VolumeGroup), and Snapshot-Size-Update, built on top of `objectstore`,
//! `radosmutex`, `reftracker`, `volumelocks`, and `taskcontroller`.

mod action;
mod backup;
mod credentials;
mod error;
mod journal_regen;
mod object;
mod phase;
mod restore;
mod snapshot_size;
mod trash_purge;
mod workflow;

pub use action::Action;
pub use backup::BackupWorkflow;
pub use credentials::{Credentials, CredentialsSource, StaticCredentialsSource};
pub use error::ReconcileError;
pub use journal_regen::{JournalKind, JournalRegenWorkflow};
pub use object::ReconcileObject;
pub use phase::Phase;
pub use restore::RestoreWorkflow;
pub use snapshot_size::SnapshotSizeWorkflow;
pub use trash_purge::TrashPurgeScheduler;
pub use workflow::{drive, Workflow};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use objectstore::{InMemoryBackend, ObjectStoreContext};
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;
    use taskcontroller::TaskController;
    use volumelocks::VolumeLocks;

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

    #[tokio::test]
    async fn backup_workflow_runs_to_done_across_two_reconciles() {
        let locks = Arc::new(VolumeLocks::new());
        let tasks = Arc::new(TaskController::new());
        let credentials = Arc::new(StaticCredentialsSource(Credentials {
            id: "admin".to_string(),
            secret: "secret".to_string(),
            keyfile: None,
            monitors: vec!["10.0.0.1:6789".to_string()],
        }));
        let workflow = BackupWorkflow {
            client_path: PathBuf::from("/bin/true"),
            pool: "rbd".to_string(),
            timeout: Duration::from_secs(5),
            tasks: tasks.clone(),
            credentials,
        };

        let mut object = FakeObject {
            id: "ns/backup-1".to_string(),
            phase: Phase::Initial,
            deletion_timestamp: None,
            finalizers: Vec::new(),
        };

        let action = drive(&workflow, &mut object, &locks).await;
        assert!(matches!(action, Action::Requeue(_)));
        assert_eq!(object.phase(), Phase::Running);
        assert!(!locks.is_held("ns/backup-1"));

        for _ in 0..100 {
            if !tasks.get("ns/backup-1").await.unwrap().running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let action = drive(&workflow, &mut object, &locks).await;
        assert_eq!(action, Action::Await);
        assert_eq!(object.phase(), Phase::Done);
    }

    #[tokio::test]
    async fn deletion_while_running_stops_task_and_clears_finalizer() {
        let locks = Arc::new(VolumeLocks::new());
        let tasks = Arc::new(TaskController::new());
        let credentials = Arc::new(StaticCredentialsSource(Credentials {
            id: "admin".to_string(),
            secret: "secret".to_string(),
            keyfile: None,
            monitors: vec![],
        }));
        let workflow = BackupWorkflow {
            client_path: PathBuf::from("/bin/sleep"),
            pool: "rbd".to_string(),
            timeout: Duration::from_secs(5),
            tasks: tasks.clone(),
            credentials,
        };

        let mut object = FakeObject {
            id: "ns/backup-2".to_string(),
            phase: Phase::Initial,
            deletion_timestamp: None,
            finalizers: Vec::new(),
        };

        drive(&workflow, &mut object, &locks).await;
        assert!(object.finalizers().iter().any(|f| f == workflow.finalizer_name()));

        object.deletion_timestamp = Some(Utc::now());
        let action = drive(&workflow, &mut object, &locks).await;
        assert_eq!(action, Action::Await);
        assert!(object.finalizers().is_empty());
        assert!(tasks.get("ns/backup-2").await.is_none());
    }

    #[tokio::test]
    async fn volume_lock_contention_requeues_without_mutating_phase() {
        let locks = Arc::new(VolumeLocks::new());
        locks.try_acquire("ns/backup-3").unwrap();

        let tasks = Arc::new(TaskController::new());
        let credentials = Arc::new(StaticCredentialsSource(Credentials {
            id: "admin".to_string(),
            secret: "secret".to_string(),
            keyfile: None,
            monitors: vec![],
        }));
        let workflow = BackupWorkflow {
            client_path: PathBuf::from("/bin/true"),
            pool: "rbd".to_string(),
            timeout: Duration::from_secs(5),
            tasks,
            credentials,
        };

        let mut object = FakeObject {
            id: "ns/backup-3".to_string(),
            phase: Phase::Initial,
            deletion_timestamp: None,
            finalizers: Vec::new(),
        };

        let action = drive(&workflow, &mut object, &locks).await;
        assert_eq!(action, Action::requeue_secs(2));
        assert_eq!(object.phase(), Phase::Initial);
    }

    #[tokio::test]
    async fn snapshot_size_workflow_sets_xattr_and_phase() {
        let ctx = Arc::new(ObjectStoreContext::new(Arc::new(InMemoryBackend::new())));
        let oid = objectstore::ObjectHandle::new("rbd", "snap-1");
        ctx.create_write_op().create(true).operate(&ctx, &oid).await.unwrap();

        let workflow = SnapshotSizeWorkflow {
            pool: "rbd".to_string(),
            ctx: ctx.clone(),
            resolve_size: Arc::new(|_id| 4096),
            max_attempts: 5,
        };
        let mut object = FakeObject {
            id: "snap-1".to_string(),
            phase: Phase::Initial,
            deletion_timestamp: None,
            finalizers: Vec::new(),
        };
        let locks = Arc::new(VolumeLocks::new());

        let action = drive(&workflow, &mut object, &locks).await;
        assert_eq!(action, Action::Await);
        assert_eq!(object.phase(), Phase::Done);

        let xattr = ctx.get_xattr(&oid, "ceph-csi.snapshot.size-bytes").await.unwrap();
        assert_eq!(u64::from_be_bytes(xattr.try_into().unwrap()), 4096);
    }
}
