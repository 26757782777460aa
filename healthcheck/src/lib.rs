//! Per-volume liveness probing (spec §4.G): a cooperative loop writes a
//! heartbeat into each volume and reads it back on an interval, and a
//! manager tracks one such checker per volume-id, exclusive or shared.

mod checker;
mod error;
mod manager;

pub use checker::HealthChecker;
pub use error::HealthCheckError;
pub use manager::HealthManager;
