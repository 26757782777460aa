use objectstore::ObjectStoreError;

#[derive(Debug, thiserror::Error)]
pub enum RefTrackerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("retry budget exhausted after {attempts} attempts: {source}")]
    Timeout {
        attempts: u32,
        #[source]
        source: Box<RefTrackerError>,
    },

    #[error(transparent)]
    ObjectStore(#[from] ObjectStoreError),
}

impl RefTrackerError {
    /// Version races are retryable by construction; `AlreadyExists` also
    /// shows up here because two concurrent `Add`s can both observe the
    /// object missing and race to create it.
    pub(crate) fn is_retryable(&self) -> bool {
        match self {
            RefTrackerError::ObjectStore(e) => {
                e.is_version_race() || matches!(e, ObjectStoreError::AlreadyExists(_))
            }
            _ => false,
        }
    }
}
