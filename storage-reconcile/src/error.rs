#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("operation already in progress on {0}")]
    AlreadyInProgress(String),

    #[error("backend reports resource in use, retry")]
    InUseRetry,

    #[error("backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Lock(#[from] radosmutex::LockError),

    #[error(transparent)]
    RefTracker(#[from] reftracker::RefTrackerError),

    #[error(transparent)]
    ObjectStore(#[from] objectstore::ObjectStoreError),

    #[error(transparent)]
    Task(#[from] taskcontroller::TaskError),
}

impl From<volumelocks::VolumeLockError> for ReconcileError {
    fn from(e: volumelocks::VolumeLockError) -> Self {
        match e {
            volumelocks::VolumeLockError::InProgress(id) => ReconcileError::AlreadyInProgress(id),
        }
    }
}
