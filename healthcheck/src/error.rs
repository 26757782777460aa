use thiserror::Error;

#[derive(Debug, Error)]
pub enum HealthCheckError {
    #[error("heartbeat file i/o failed: {0}")]
    Io(String),

    #[error("heartbeat readback did not match the value written")]
    Mismatch,

    #[error("no health checker registered for volume {0}")]
    NotFound(String),
}
