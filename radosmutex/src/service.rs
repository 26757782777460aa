use crate::error::LockError;
use crate::record::{LockRecord, LockState, LOCK_DURATION_SECS};
use crate::retry::RetryPolicy;
use crate::time::unix_now;
use async_trait::async_trait;
use objectstore::{ObjectHandle, ObjectStoreContext, ObjectStoreError};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Adds up to 50% random jitter to a base backoff so a handful of contending
/// acquirers don't keep retrying in lockstep against the same lock.
fn jittered(base: Duration) -> Duration {
    let factor = 1.0 + rand::random::<f64>() * 0.5;
    Duration::from_secs_f64(base.as_secs_f64() * factor)
}

/// A fair, expiring, generation-checked mutual-exclusion lock keyed by `name`
/// within a single lock-container object (spec §4.B).
///
/// A single `ObjectHandle` plays the role of the lock container (analogous to
/// a Ceph object such as `csi.volumes.lock`); individual named locks live as
/// omap entries keyed by `name` inside it, so many locks can share one
/// container and one version counter.
#[async_trait]
pub trait LockService: Send + Sync {
    /// Exclusively creates the lock container and seeds `name` as held by
    /// `owner`. Fails with `ObjectStore(AlreadyExists)` if the container
    /// already exists.
    async fn init(
        &self,
        ctx: &ObjectStoreContext,
        oid: &ObjectHandle,
        name: &str,
        owner: &str,
    ) -> Result<LockRecord, LockError>;

    /// Runs the single-attempt acquire algorithm (spec §4.B steps 1-5) in a
    /// loop governed by `retry`, sleeping between attempts on a version race
    /// or a held-and-unexpired lock, and surfacing any other failure
    /// immediately.
    async fn try_acquire(
        &self,
        ctx: &ObjectStoreContext,
        oid: &ObjectHandle,
        name: &str,
        owner: &str,
        retry: RetryPolicy,
    ) -> Result<LockRecord, LockError>;

    /// Clears `name` back to unlocked. Only the current owner may do this.
    async fn release(
        &self,
        ctx: &ObjectStoreContext,
        oid: &ObjectHandle,
        name: &str,
        owner: &str,
    ) -> Result<(), LockError>;

    /// Removes `name` from the container outright, regardless of owner.
    async fn delete(
        &self,
        ctx: &ObjectStoreContext,
        oid: &ObjectHandle,
        name: &str,
    ) -> Result<(), LockError>;
}

/// `LockService` implemented directly on top of an object-store context.
#[derive(Debug, Default, Clone, Copy)]
pub struct RadosLockService;

impl RadosLockService {
    pub fn new() -> Self {
        Self
    }

    async fn read_record(
        ctx: &ObjectStoreContext,
        oid: &ObjectHandle,
        name: &str,
        version: u64,
    ) -> Result<Option<LockRecord>, LockError> {
        let result = ctx
            .create_read_op()
            .assert_version(version)
            .get_omap_values_by_keys(vec![name.to_string()])
            .operate(ctx, oid)
            .await?;
        let decoded = result
            .omap_iter()
            .next()
            .map(|(_, bytes)| LockRecord::decode(bytes))
            .transpose();
        decoded
    }

    /// Single pass of the acquire algorithm: read the current record at the
    /// container's present version, decide whether `name` is free, then
    /// attempt a version-asserted write granting it to `owner`.
    async fn attempt_acquire(
        ctx: &ObjectStoreContext,
        oid: &ObjectHandle,
        name: &str,
        owner: &str,
    ) -> Result<LockRecord, LockError> {
        // The lock container is created lazily on first use: a missing
        // container is just an unheld lock, not an error. `Init` remains
        // available for callers that want to create it (and seed a first
        // holder) up front.
        let version = match ctx.stat(oid).await {
            Ok(v) => Some(v),
            Err(ObjectStoreError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };

        let now = unix_now();
        let new_record = LockRecord::locked(owner, now + LOCK_DURATION_SECS);
        let mut omap = BTreeMap::new();
        omap.insert(name.to_string(), new_record.encode()?);

        match version {
            None => {
                ctx.create_write_op()
                    .create(true)
                    .set_omap(omap)
                    .operate(ctx, oid)
                    .await?;
            }
            Some(version) => {
                let current = Self::read_record(ctx, oid, name, version).await?;
                if let Some(record) = &current {
                    if record.is_held(now) {
                        return Err(LockError::Busy(record.clone()));
                    }
                }
                ctx.create_write_op()
                    .assert_version(version)
                    .set_omap(omap)
                    .operate(ctx, oid)
                    .await?;
            }
        }
        Ok(new_record)
    }
}

#[async_trait]
impl LockService for RadosLockService {
    #[instrument(skip(self, ctx), fields(oid = %oid, name))]
    async fn init(
        &self,
        ctx: &ObjectStoreContext,
        oid: &ObjectHandle,
        name: &str,
        owner: &str,
    ) -> Result<LockRecord, LockError> {
        if owner.is_empty() {
            return Err(LockError::InvalidArgument("owner must not be empty".into()));
        }
        if name.is_empty() {
            return Err(LockError::InvalidArgument(
                "lock name must not be empty".into(),
            ));
        }

        let record = LockRecord::locked(owner, unix_now() + LOCK_DURATION_SECS);
        let mut omap = BTreeMap::new();
        omap.insert(name.to_string(), record.encode()?);
        ctx.create_write_op()
            .create(true)
            .set_omap(omap)
            .operate(ctx, oid)
            .await?;
        debug!("initialized lock container");
        Ok(record)
    }

    #[instrument(skip(self, ctx, retry), fields(oid = %oid, name, max_attempts = retry.max_attempts))]
    async fn try_acquire(
        &self,
        ctx: &ObjectStoreContext,
        oid: &ObjectHandle,
        name: &str,
        owner: &str,
        retry: RetryPolicy,
    ) -> Result<LockRecord, LockError> {
        if owner.is_empty() {
            return Err(LockError::InvalidArgument("owner must not be empty".into()));
        }
        if name.is_empty() {
            return Err(LockError::InvalidArgument(
                "lock name must not be empty".into(),
            ));
        }

        let mut last_err = None;
        for attempt in 1..=retry.max_attempts {
            match Self::attempt_acquire(ctx, oid, name, owner).await {
                Ok(record) => return Ok(record),
                Err(e) if e.is_retryable() => {
                    warn!(attempt, "acquire attempt contended, retrying");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
            if attempt < retry.max_attempts {
                tokio::time::sleep(jittered(retry.sleep)).await;
            }
        }

        Err(LockError::Timeout {
            attempts: retry.max_attempts,
            source: Box::new(last_err.expect("loop ran at least once")),
        })
    }

    #[instrument(skip(self, ctx), fields(oid = %oid, name))]
    async fn release(
        &self,
        ctx: &ObjectStoreContext,
        oid: &ObjectHandle,
        name: &str,
        owner: &str,
    ) -> Result<(), LockError> {
        let version = ctx.stat(oid).await?;
        let current = Self::read_record(ctx, oid, name, version).await?;

        match current {
            Some(record) if record.state == LockState::Locked && record.owner == owner => {}
            Some(_) => return Err(LockError::NotOwner),
            None => return Err(LockError::NotFound),
        }

        let mut omap = BTreeMap::new();
        omap.insert(name.to_string(), LockRecord::unlocked().encode()?);
        ctx.create_write_op()
            .assert_version(version)
            .set_omap(omap)
            .operate(ctx, oid)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, ctx), fields(oid = %oid, name))]
    async fn delete(
        &self,
        ctx: &ObjectStoreContext,
        oid: &ObjectHandle,
        name: &str,
    ) -> Result<(), LockError> {
        let version = ctx.stat(oid).await?;
        ctx.create_write_op()
            .assert_version(version)
            .rm_omap_keys(vec![name.to_string()])
            .operate(ctx, oid)
            .await?;
        Ok(())
    }
}
