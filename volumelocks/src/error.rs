#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum VolumeLockError {
    #[error("operation already in progress on {0}")]
    InProgress(String),
}
