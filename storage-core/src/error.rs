use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error(transparent)]
    ObjectStore(#[from] objectstore::ObjectStoreError),

    #[error(transparent)]
    Lock(#[from] radosmutex::LockError),

    #[error(transparent)]
    RefTracker(#[from] reftracker::RefTrackerError),

    #[error(transparent)]
    VolumeLock(#[from] volumelocks::VolumeLockError),

    #[error(transparent)]
    Task(#[from] taskcontroller::TaskError),

    #[error(transparent)]
    Reconcile(#[from] storage_reconcile::ReconcileError),

    #[error(transparent)]
    HealthCheck(#[from] healthcheck::HealthCheckError),
}
