use crate::{Backend, ObjectHandle, ObjectStoreError, Version};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One step of a write-op pipeline, in the fixed order spec §4.A prescribes.
#[derive(Debug, Clone)]
pub enum WriteStep {
    AssertVersion(Version),
    Remove,
    Create { exclusive: bool },
    SetXattr { name: String, value: Vec<u8> },
    WriteFull(Vec<u8>),
    RmOmapKeys(Vec<String>),
    SetOmap(BTreeMap<String, Vec<u8>>),
}

/// One step of a read-op pipeline.
#[derive(Debug, Clone)]
pub enum ReadStep {
    AssertVersion(Version),
    Read { offset: u64, len: u64 },
    GetOmapValuesByKeys(Vec<String>),
    ListOmap,
}

/// Result of a read-op: the payload bytes (if a `Read` step ran) and the omap
/// entries (if a `GetOmapValuesByKeys` step ran), in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ReadOpResult {
    pub data: Option<Vec<u8>>,
    pub omap: Option<BTreeMap<String, Vec<u8>>>,
}

impl ReadOpResult {
    /// Iterator over `(key, value)` pairs, exhausting to `None` at the end
    /// (spec §4.A "the keys-step exposes an iterator ... or nil at end").
    pub fn omap_iter(&self) -> impl Iterator<Item = (&String, &Vec<u8>)> {
        self.omap.iter().flat_map(|m| m.iter())
    }
}

/// A write-op under construction. Steps accumulate in call order and execute
/// in that same order inside a single atomic backend call (spec §4.A).
#[derive(Debug, Clone, Default)]
pub struct WriteOp {
    steps: Vec<WriteStep>,
}

impl WriteOp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assert_version(mut self, version: Version) -> Self {
        self.steps.push(WriteStep::AssertVersion(version));
        self
    }

    pub fn remove(mut self) -> Self {
        self.steps.push(WriteStep::Remove);
        self
    }

    pub fn create(mut self, exclusive: bool) -> Self {
        self.steps.push(WriteStep::Create { exclusive });
        self
    }

    pub fn set_xattr(mut self, name: impl Into<String>, value: Vec<u8>) -> Self {
        self.steps.push(WriteStep::SetXattr {
            name: name.into(),
            value,
        });
        self
    }

    pub fn write_full(mut self, data: Vec<u8>) -> Self {
        self.steps.push(WriteStep::WriteFull(data));
        self
    }

    pub fn rm_omap_keys(mut self, keys: Vec<String>) -> Self {
        self.steps.push(WriteStep::RmOmapKeys(keys));
        self
    }

    pub fn set_omap(mut self, kvs: BTreeMap<String, Vec<u8>>) -> Self {
        self.steps.push(WriteStep::SetOmap(kvs));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Runs the accumulated steps atomically against `ctx`'s backend,
    /// publishing the new version to `ctx.get_last_version()` on success.
    pub async fn operate(
        self,
        ctx: &ObjectStoreContext,
        oid: &ObjectHandle,
    ) -> Result<(), ObjectStoreError> {
        let version = ctx.backend.apply_write(oid, &self.steps).await?;
        ctx.last_version.store(version, Ordering::SeqCst);
        Ok(())
    }
}

/// A read-op under construction, same step-ordering contract as `WriteOp`.
#[derive(Debug, Clone, Default)]
pub struct ReadOp {
    steps: Vec<ReadStep>,
}

impl ReadOp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assert_version(mut self, version: Version) -> Self {
        self.steps.push(ReadStep::AssertVersion(version));
        self
    }

    pub fn read(mut self, offset: u64, len: u64) -> Self {
        self.steps.push(ReadStep::Read { offset, len });
        self
    }

    pub fn get_omap_values_by_keys(mut self, keys: Vec<String>) -> Self {
        self.steps.push(ReadStep::GetOmapValuesByKeys(keys));
        self
    }

    /// Enumerates the object's complete omap, not just a key subset. Used by
    /// callers that must know the full set of entries to decide whether any
    /// survive (e.g. a refcount check), rather than the status of a handful
    /// of keys they already have in hand.
    pub fn list_omap(mut self) -> Self {
        self.steps.push(ReadStep::ListOmap);
        self
    }

    pub async fn operate(
        self,
        ctx: &ObjectStoreContext,
        oid: &ObjectHandle,
    ) -> Result<ReadOpResult, ObjectStoreError> {
        ctx.backend.apply_read(oid, &self.steps).await
    }
}

/// Process-wide connection context: the object-store client handle callers
/// obtain once and reuse across operations (spec §4.A). Tracks the version of
/// the object most recently touched through it.
pub struct ObjectStoreContext {
    backend: Arc<dyn Backend>,
    last_version: AtomicU64,
}

impl ObjectStoreContext {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            last_version: AtomicU64::new(0),
        }
    }

    pub fn get_last_version(&self) -> Version {
        self.last_version.load(Ordering::SeqCst)
    }

    pub fn create_write_op(&self) -> WriteOp {
        WriteOp::new()
    }

    pub fn create_read_op(&self) -> ReadOp {
        ReadOp::new()
    }

    /// Current version of `oid`, independent of any op (used by callers that
    /// need to read-before-write, e.g. the lock service's single-attempt
    /// algorithm, spec §4.B step 1).
    pub async fn stat(&self, oid: &ObjectHandle) -> Result<Version, ObjectStoreError> {
        let version = self.backend.stat(oid).await?;
        self.last_version.store(version, Ordering::SeqCst);
        Ok(version)
    }

    pub async fn get_xattr(
        &self,
        oid: &ObjectHandle,
        name: &str,
    ) -> Result<Vec<u8>, ObjectStoreError> {
        self.backend.get_xattr(oid, name).await
    }
}
