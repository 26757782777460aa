//! Distributed lock service (spec §4.B): a fair, expiring, generation-checked
//! mutual exclusion primitive built entirely out of version-asserted
//! object-store operations. No transport of its own; it is a set of
//! `objectstore` call patterns plus a caller-owned retry loop.

mod error;
mod record;
mod retry;
mod service;
mod time;

pub use error::LockError;
pub use record::{LockRecord, LockState, LOCK_DURATION_SECS, MAX_OWNER_LEN};
pub use retry::RetryPolicy;
pub use service::{LockService, RadosLockService};
