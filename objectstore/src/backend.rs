use crate::{ObjectHandle, ObjectStoreError, ReadOpResult, ReadStep, Version, WriteStep};
use async_trait::async_trait;

/// The low-level transport a real implementation would bind to an actual
/// cluster connection (spec §6 "Object-store on-the-wire"). A single call
/// applies every step of one op atomically: either every step commits and the
/// version is bumped exactly once, or none of it is visible (spec §4.A).
///
/// This crate's composable `WriteOp`/`ReadOp` builders are the public surface;
/// `Backend` is the seam a production build would replace with a real
/// cluster client without touching any caller above this crate.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn apply_write(
        &self,
        oid: &ObjectHandle,
        steps: &[WriteStep],
    ) -> Result<Version, ObjectStoreError>;

    async fn apply_read(
        &self,
        oid: &ObjectHandle,
        steps: &[ReadStep],
    ) -> Result<ReadOpResult, ObjectStoreError>;

    /// Current version of `oid`. Fails with `NotFound` if the object does
    /// not exist. Used by callers that must read-before-write (spec §4.B
    /// step 1, §4.C's read-then-retry loop).
    async fn stat(&self, oid: &ObjectHandle) -> Result<Version, ObjectStoreError>;

    /// Out-of-band accessor used by callers that need to observe an xattr
    /// without going through the read-op pipeline (e.g. diagnostics). Not
    /// part of the wire-level read-op in spec §4.A.
    async fn get_xattr(&self, oid: &ObjectHandle, name: &str) -> Result<Vec<u8>, ObjectStoreError>;
}
