use crate::config::Config;
use crate::error::CoreError;
use healthcheck::HealthManager;
use objectstore::{Backend, ObjectStoreContext};
use radosmutex::RadosLockService;
use reftracker::ObjectRefTracker;
use std::path::PathBuf;
use std::sync::Arc;
use storage_reconcile::{
    drive, Action, BackupWorkflow, Credentials, CredentialsSource, JournalKind, JournalRegenWorkflow,
    ReconcileObject, RestoreWorkflow, StaticCredentialsSource, TrashPurgeScheduler,
};
use taskcontroller::TaskController;
use volumelocks::VolumeLocks;

/// Wires components (A)-(G) into one process (spec §2 "Data flow"). Owns no
/// business logic of its own beyond construction and the two standing
/// background loops (trash-purge, health checks); reconciliation itself is
/// driven by whatever external event loop calls `reconcile_backup` /
/// `reconcile_restore` / `reconcile_journal_regen` per object.
pub struct StorageCore {
    pub ctx: Arc<ObjectStoreContext>,
    pub locks: RadosLockService,
    pub tracker: ObjectRefTracker,
    pub volume_locks: Arc<VolumeLocks>,
    pub tasks: Arc<TaskController>,
    pub health: Arc<HealthManager>,
    pub trash_purge: Arc<TrashPurgeScheduler>,
    config: Config,
    credentials: Arc<dyn CredentialsSource>,
}

impl StorageCore {
    pub fn new(config: Config, backend: Arc<dyn Backend>, credentials: Arc<dyn CredentialsSource>) -> Self {
        let trash_purge = Arc::new(TrashPurgeScheduler::new(
            config.client_path.clone(),
            config.trash_purge_interval(),
        ));
        Self {
            ctx: Arc::new(ObjectStoreContext::new(backend)),
            locks: RadosLockService::new(),
            tracker: ObjectRefTracker::new(),
            volume_locks: Arc::new(VolumeLocks::new()),
            tasks: Arc::new(TaskController::new()),
            health: Arc::new(HealthManager::new()),
            trash_purge,
            config,
            credentials,
        }
    }

    /// Convenience constructor for deployments with one fixed set of
    /// cluster credentials (spec §4.F "resolve credentials").
    pub fn with_static_credentials(config: Config, backend: Arc<dyn Backend>, credentials: Credentials) -> Self {
        Self::new(config, backend, Arc::new(StaticCredentialsSource(credentials)))
    }

    fn backup_workflow(&self) -> BackupWorkflow {
        BackupWorkflow {
            client_path: self.config.client_path.clone(),
            pool: self.config.pool.clone(),
            timeout: std::time::Duration::from_secs(600),
            tasks: self.tasks.clone(),
            credentials: self.credentials.clone(),
        }
    }

    fn restore_workflow(&self) -> RestoreWorkflow {
        RestoreWorkflow {
            client_path: self.config.client_path.clone(),
            pool: self.config.pool.clone(),
            timeout: std::time::Duration::from_secs(600),
            tasks: self.tasks.clone(),
            credentials: self.credentials.clone(),
        }
    }

    fn journal_regen_workflow(&self, kind: JournalKind) -> JournalRegenWorkflow {
        JournalRegenWorkflow {
            kind,
            pool: self.config.pool.clone(),
            ctx: self.ctx.clone(),
            tracker: self.tracker,
            locks: self.locks,
            owner: self.config.lock_owner.clone(),
        }
    }

    pub async fn reconcile_backup(&self, object: &mut dyn ReconcileObject) -> Action {
        drive(&self.backup_workflow(), object, &self.volume_locks).await
    }

    pub async fn reconcile_restore(&self, object: &mut dyn ReconcileObject) -> Action {
        drive(&self.restore_workflow(), object, &self.volume_locks).await
    }

    pub async fn reconcile_journal_regen(&self, kind: JournalKind, object: &mut dyn ReconcileObject) -> Action {
        drive(&self.journal_regen_workflow(kind), object, &self.volume_locks).await
    }

    /// Registers `pool` with the trash-purge scheduler; harmless to call
    /// repeatedly for the same pool (spec §4.F).
    pub async fn observe_pool_for_trash_purge(&self, pool: &str) {
        self.trash_purge.observe_pool(pool).await;
    }

    pub async fn start_health_check(&self, volume_id: &str, volume_path: PathBuf) {
        self.health
            .start_with(volume_id, volume_path, self.config.health_interval(), self.config.health_timeout())
            .await;
    }

    pub async fn stop_health_check(&self, volume_id: &str) {
        self.health.stop(volume_id).await;
    }

    pub async fn is_healthy(&self, volume_id: &str) -> Result<(bool, Option<String>), CoreError> {
        Ok(self.health.is_healthy(volume_id).await?)
    }

    /// Background loop: ticks the trash-purge scheduler until cancelled.
    /// Intended to be spawned once per process (spec §4.F "periodic").
    pub async fn run_trash_purge_loop(&self, period: std::time::Duration) {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            self.trash_purge.run_due().await;
        }
    }
}
