use crate::LockRecord;
use objectstore::ObjectStoreError;

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("lock not found")]
    NotFound,

    #[error("lock busy, held by '{}' until {}", .0.owner, .0.expiry)]
    Busy(LockRecord),

    #[error("release attempted by non-owner")]
    NotOwner,

    #[error("retry budget exhausted after {attempts} attempts: {source}")]
    Timeout {
        attempts: u32,
        #[source]
        source: Box<LockError>,
    },

    #[error(transparent)]
    ObjectStore(#[from] ObjectStoreError),
}

impl LockError {
    /// Whether `try_acquire`'s retry loop should sleep and try again rather
    /// than surface this immediately (spec §4.B step 5, and the fairness
    /// note that acquirers spin through `Busy` until the holder expires).
    pub(crate) fn is_retryable(&self) -> bool {
        matches!(self, LockError::Busy(_))
            || matches!(self, LockError::ObjectStore(e) if e.is_version_race())
    }
}
