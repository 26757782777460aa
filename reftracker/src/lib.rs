//! Reference tracker (spec §4.C): named references to a shared object-store
//! object, with normal/mask semantics and atomic create-on-first-ref,
//! delete-on-last-ref. Like `radosmutex`, this is a call pattern over
//! `objectstore`, not a service with its own transport.

mod error;
mod reftype;
mod retry;
mod tracker;

pub use error::RefTrackerError;
pub use reftype::RefType;
pub use retry::RetryPolicy;
pub use tracker::{ObjectRefTracker, RefTracker, VERSION_XATTR};
