use crate::error::RefTrackerError;
use crate::reftype::RefType;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use objectstore::{ObjectHandle, ObjectStoreContext, ObjectStoreError};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, instrument, warn};

/// Xattr carrying the reftracker object's format version (spec §6): 4-byte
/// big-endian unsigned integer, set once at object creation.
pub const VERSION_XATTR: &str = "ceph-csi.reftracker.version";
const INITIAL_VERSION: u32 = 1;

/// Maintains a set of named references to a shared object, with normal/mask
/// semantics and atomic create-on-first-ref / delete-on-last-ref (spec §4.C).
#[async_trait]
pub trait RefTracker: Send + Sync {
    /// Adds every name in `refs` as `Normal`. Returns `true` iff this call
    /// created the backing object.
    async fn add(
        &self,
        ctx: &ObjectStoreContext,
        oid: &ObjectHandle,
        refs: &BTreeSet<String>,
        retry: RetryPolicy,
    ) -> Result<bool, RefTrackerError>;

    /// Applies each `(name, RefType)` removal. Returns `true` iff the backing
    /// object was deleted because no `Normal` entries remain (or it was
    /// already absent).
    async fn remove(
        &self,
        ctx: &ObjectStoreContext,
        oid: &ObjectHandle,
        refs: &BTreeMap<String, RefType>,
        retry: RetryPolicy,
    ) -> Result<bool, RefTrackerError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ObjectRefTracker;

impl ObjectRefTracker {
    pub fn new() -> Self {
        Self
    }

    async fn attempt_add(
        ctx: &ObjectStoreContext,
        oid: &ObjectHandle,
        refs: &BTreeSet<String>,
    ) -> Result<bool, RefTrackerError> {
        match ctx.stat(oid).await {
            Ok(version) => {
                let keys: Vec<String> = refs.iter().cloned().collect();
                let existing = ctx
                    .create_read_op()
                    .assert_version(version)
                    .get_omap_values_by_keys(keys.clone())
                    .operate(ctx, oid)
                    .await?;

                let mut to_write = BTreeMap::new();
                for key in &keys {
                    match existing.omap.as_ref().and_then(|m| m.get(key)) {
                        Some(bytes) => {
                            let current = RefType::from_byte(
                                *bytes
                                    .first()
                                    .ok_or_else(|| {
                                        RefTrackerError::InvalidArgument(
                                            "empty reftype value".into(),
                                        )
                                    })?,
                            )?;
                            // Masked keys are invisible to Add; Normal is idempotent.
                            if current == RefType::Normal {
                                continue;
                            }
                        }
                        None => {
                            to_write.insert(key.clone(), vec![RefType::Normal.to_byte()]);
                        }
                    }
                }

                if to_write.is_empty() {
                    return Ok(false);
                }

                ctx.create_write_op()
                    .assert_version(version)
                    .set_omap(to_write)
                    .operate(ctx, oid)
                    .await?;
                Ok(false)
            }
            Err(ObjectStoreError::NotFound(_)) => {
                let mut omap = BTreeMap::new();
                for key in refs {
                    omap.insert(key.clone(), vec![RefType::Normal.to_byte()]);
                }
                ctx.create_write_op()
                    .create(true)
                    .set_xattr(VERSION_XATTR, INITIAL_VERSION.to_be_bytes().to_vec())
                    .set_omap(omap)
                    .operate(ctx, oid)
                    .await?;
                Ok(true)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn attempt_remove(
        ctx: &ObjectStoreContext,
        oid: &ObjectHandle,
        refs: &BTreeMap<String, RefType>,
    ) -> Result<bool, RefTrackerError> {
        let version = match ctx.stat(oid).await {
            Ok(v) => v,
            Err(ObjectStoreError::NotFound(_)) => return Ok(true),
            Err(e) => return Err(e.into()),
        };

        let existing = ctx
            .create_read_op()
            .assert_version(version)
            .list_omap()
            .operate(ctx, oid)
            .await?;
        let mut state: BTreeMap<String, RefType> = existing
            .omap
            .unwrap_or_default()
            .into_iter()
            .map(|(name, bytes)| {
                let rt = RefType::from_byte(
                    *bytes
                        .first()
                        .ok_or_else(|| RefTrackerError::InvalidArgument("empty reftype value".into()))?,
                )?;
                Ok((name, rt))
            })
            .collect::<Result<_, RefTrackerError>>()?;

        let mut to_set = BTreeMap::new();
        let mut to_remove = Vec::new();
        for (name, requested) in refs {
            let current = state.get(name).copied();
            match (requested, current) {
                (RefType::Normal, Some(RefType::Normal)) => {
                    to_remove.push(name.clone());
                    state.remove(name);
                }
                (RefType::Normal, Some(RefType::Mask)) => {
                    to_remove.push(name.clone());
                    state.remove(name);
                }
                (RefType::Normal, None) => {}
                (RefType::Mask, Some(RefType::Normal)) => {
                    to_set.insert(name.clone(), vec![RefType::Mask.to_byte()]);
                    state.insert(name.clone(), RefType::Mask);
                }
                (RefType::Mask, Some(RefType::Mask)) => {}
                (RefType::Mask, None) => {}
            }
        }

        let remaining = state.values().filter(|t| **t == RefType::Normal).count();

        if remaining == 0 {
            ctx.create_write_op()
                .assert_version(version)
                .remove()
                .operate(ctx, oid)
                .await?;
            return Ok(true);
        }

        if !to_remove.is_empty() || !to_set.is_empty() {
            let mut op = ctx.create_write_op().assert_version(version);
            if !to_remove.is_empty() {
                op = op.rm_omap_keys(to_remove);
            }
            if !to_set.is_empty() {
                op = op.set_omap(to_set);
            }
            op.operate(ctx, oid).await?;
        }
        Ok(false)
    }
}

#[async_trait]
impl RefTracker for ObjectRefTracker {
    #[instrument(skip(self, ctx, retry), fields(oid = %oid, count = refs.len()))]
    async fn add(
        &self,
        ctx: &ObjectStoreContext,
        oid: &ObjectHandle,
        refs: &BTreeSet<String>,
        retry: RetryPolicy,
    ) -> Result<bool, RefTrackerError> {
        if refs.is_empty() {
            return Err(RefTrackerError::InvalidArgument(
                "ref set must not be empty".into(),
            ));
        }
        for name in refs {
            if name.is_empty() {
                return Err(RefTrackerError::InvalidArgument(
                    "ref name must not be empty".into(),
                ));
            }
        }

        let mut last_err = None;
        for attempt in 1..=retry.max_attempts {
            match Self::attempt_add(ctx, oid, refs).await {
                Ok(created) => return Ok(created),
                Err(e) if e.is_retryable() => {
                    warn!(attempt, "add contended, retrying");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
            if attempt < retry.max_attempts {
                tokio::time::sleep(retry.sleep).await;
            }
        }
        Err(RefTrackerError::Timeout {
            attempts: retry.max_attempts,
            source: Box::new(last_err.expect("loop ran at least once")),
        })
    }

    #[instrument(skip(self, ctx, retry), fields(oid = %oid, count = refs.len()))]
    async fn remove(
        &self,
        ctx: &ObjectStoreContext,
        oid: &ObjectHandle,
        refs: &BTreeMap<String, RefType>,
        retry: RetryPolicy,
    ) -> Result<bool, RefTrackerError> {
        if refs.is_empty() {
            return Err(RefTrackerError::InvalidArgument(
                "ref map must not be empty".into(),
            ));
        }
        for name in refs.keys() {
            if name.is_empty() {
                return Err(RefTrackerError::InvalidArgument(
                    "ref name must not be empty".into(),
                ));
            }
        }

        let mut last_err = None;
        for attempt in 1..=retry.max_attempts {
            match Self::attempt_remove(ctx, oid, refs).await {
                Ok(deleted) => {
                    debug!(deleted, "remove completed");
                    return Ok(deleted);
                }
                Err(e) if e.is_retryable() => {
                    warn!(attempt, "remove contended, retrying");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
            if attempt < retry.max_attempts {
                tokio::time::sleep(retry.sleep).await;
            }
        }
        Err(RefTrackerError::Timeout {
            attempts: retry.max_attempts,
            source: Box::new(last_err.expect("loop ran at least once")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use objectstore::InMemoryBackend;
    use std::sync::Arc;

    fn ctx() -> ObjectStoreContext {
        ObjectStoreContext::new(Arc::new(InMemoryBackend::new()))
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn map(pairs: &[(&str, RefType)]) -> BTreeMap<String, RefType> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[tokio::test]
    async fn bulk_add_remove_cycle_repeats_cleanly() {
        let ctx = ctx();
        let tracker = ObjectRefTracker::new();
        let oid = ObjectHandle::new("pool", "rt");

        let created = tracker
            .add(&ctx, &oid, &set(&["a", "b", "c"]), RetryPolicy::default())
            .await
            .unwrap();
        assert!(created);

        let deleted = tracker
            .remove(
                &ctx,
                &oid,
                &map(&[("a", RefType::Normal), ("b", RefType::Normal), ("c", RefType::Normal)]),
                RetryPolicy::default(),
            )
            .await
            .unwrap();
        assert!(deleted);
        assert!(ctx.stat(&oid).await.is_err());

        // A second identical cycle behaves the same way.
        let created_again = tracker
            .add(&ctx, &oid, &set(&["a", "b", "c"]), RetryPolicy::default())
            .await
            .unwrap();
        assert!(created_again);
        let deleted_again = tracker
            .remove(
                &ctx,
                &oid,
                &map(&[("a", RefType::Normal), ("b", RefType::Normal), ("c", RefType::Normal)]),
                RetryPolicy::default(),
            )
            .await
            .unwrap();
        assert!(deleted_again);
    }

    #[tokio::test]
    async fn mask_then_add_does_not_resurrect_and_lifts_only_via_normal_remove() {
        let ctx = ctx();
        let tracker = ObjectRefTracker::new();
        let oid = ObjectHandle::new("pool", "rt");

        tracker
            .add(&ctx, &oid, &set(&["r1", "r2", "r3"]), RetryPolicy::default())
            .await
            .unwrap();

        let deleted = tracker
            .remove(
                &ctx,
                &oid,
                &map(&[("r1", RefType::Mask), ("r2", RefType::Mask)]),
                RetryPolicy::default(),
            )
            .await
            .unwrap();
        assert!(!deleted);

        let created = tracker
            .add(&ctx, &oid, &set(&["r1", "r2"]), RetryPolicy::default())
            .await
            .unwrap();
        assert!(!created);

        let deleted = tracker
            .remove(&ctx, &oid, &map(&[("r3", RefType::Normal)]), RetryPolicy::default())
            .await
            .unwrap();
        assert!(deleted);
        assert!(ctx.stat(&oid).await.is_err());
    }

    #[tokio::test]
    async fn remove_against_nonexistent_object_is_a_noop_delete() {
        let ctx = ctx();
        let tracker = ObjectRefTracker::new();
        let oid = ObjectHandle::new("pool", "rt");

        let deleted = tracker
            .remove(&ctx, &oid, &map(&[("a", RefType::Normal)]), RetryPolicy::default())
            .await
            .unwrap();
        assert!(deleted);
    }

    #[tokio::test]
    async fn empty_ref_set_is_invalid_argument() {
        let ctx = ctx();
        let tracker = ObjectRefTracker::new();
        let oid = ObjectHandle::new("pool", "rt");

        let err = tracker
            .add(&ctx, &oid, &BTreeSet::new(), RetryPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RefTrackerError::InvalidArgument(_)));

        let err = tracker
            .remove(&ctx, &oid, &BTreeMap::new(), RetryPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RefTrackerError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn version_xattr_set_on_creation() {
        let ctx = ctx();
        let tracker = ObjectRefTracker::new();
        let oid = ObjectHandle::new("pool", "rt");
        tracker
            .add(&ctx, &oid, &set(&["a"]), RetryPolicy::default())
            .await
            .unwrap();

        let xattr = ctx.get_xattr(&oid, VERSION_XATTR).await.unwrap();
        assert_eq!(xattr, 1u32.to_be_bytes().to_vec());
    }
}
