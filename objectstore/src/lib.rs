//! Object-store client abstraction (spec §4.A): version-asserted read/write
//! composites over (pool, oid) objects carrying a raw payload, xattrs, and an
//! ordered omap. Callers never talk to a transport directly; they build a
//! `WriteOp`/`ReadOp` pipeline and hand it to an `ObjectStoreContext`, whose
//! `Backend` is the only seam a production build would swap for a real
//! cluster client.

mod backend;
mod error;
mod handle;
mod memory;
mod ops;

pub use backend::Backend;
pub use error::ObjectStoreError;
pub use handle::ObjectHandle;
pub use memory::InMemoryBackend;
pub use ops::{ObjectStoreContext, ReadOp, ReadOpResult, ReadStep, WriteOp, WriteStep};

/// Objects carry a monotonically increasing version, bumped by one on every
/// successful write-op.
pub type Version = u64;
