use crate::Version;

/// Error taxonomy surfaced by the object-store abstraction (spec §4.A, §7).
///
/// Version-mismatch variants are not terminal failures by themselves: callers
/// that run an optimistic-concurrency retry loop (the lock service, the
/// reference tracker) are expected to catch them and retry from a fresh read.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ObjectStoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("object already exists: {0}")]
    AlreadyExists(String),

    #[error("version too old: expected {expected}, object is at {found}")]
    VersionTooOld { expected: Version, found: Version },

    #[error("version too new: expected {expected}, object is at {found}")]
    VersionTooNew { expected: Version, found: Version },

    #[error("no data for xattr '{0}'")]
    NoData(String),

    #[error("short read: expected {expected} bytes, got {actual}")]
    ReadIncomplete { expected: usize, actual: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("backend I/O error: {0}")]
    Io(String),
}

impl ObjectStoreError {
    /// Version races are the only class of object-store error that a caller's
    /// retry loop should swallow and re-attempt (spec §9 "Assert-version retry").
    pub fn is_version_race(&self) -> bool {
        matches!(
            self,
            ObjectStoreError::VersionTooOld { .. } | ObjectStoreError::VersionTooNew { .. }
        )
    }
}
