use crate::error::ReconcileError;
use crate::phase::Phase;
use crate::workflow::Workflow;
use async_trait::async_trait;
use objectstore::{ObjectHandle, ObjectStoreContext};
use radosmutex::{LockService, RadosLockService};
use reftracker::{ObjectRefTracker, RefTracker, RetryPolicy};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

/// Distinguishes the two journal-regeneration flows (spec §4.F): they share
/// identical mechanics, differing only in which reftracker container object
/// the regenerated entry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalKind {
    Volume,
    VolumeGroup,
}

impl JournalKind {
    fn oid_name(self) -> &'static str {
        match self {
            JournalKind::Volume => "csi.volumes.journal",
            JournalKind::VolumeGroup => "csi.volumegroups.journal",
        }
    }
}

/// Re-establishes a journal entry's reference after a crash or a migration
/// leaves it orphaned, by re-adding the volume/group's own id as a `Normal`
/// reference on its journal container object (spec §4.F, synchronous
/// metadata flow dispatching to (C)).
pub struct JournalRegenWorkflow {
    pub kind: JournalKind,
    pub pool: String,
    pub ctx: Arc<ObjectStoreContext>,
    pub tracker: ObjectRefTracker,
    /// Guards the regeneration itself across concurrently running
    /// `storage-core` replicas (spec §4.B); reconciling the same object
    /// twice within one process is already excluded by `MaxConcurrentReconciles
    /// = 1` plus the in-process volume lock (§4.D).
    pub locks: RadosLockService,
    pub owner: String,
}

#[async_trait]
impl Workflow for JournalRegenWorkflow {
    fn finalizer_name(&self) -> &str {
        match self.kind {
            JournalKind::Volume => "storage-core.ceph-csi/journal-regen-volume",
            JournalKind::VolumeGroup => "storage-core.ceph-csi/journal-regen-volumegroup",
        }
    }

    async fn cleanup(&self, _id: &str) -> Result<(), ReconcileError> {
        // Metadata-only flow: nothing external to stop, no task registered.
        Ok(())
    }

    async fn run(&self, id: &str) -> Result<Phase, ReconcileError> {
        let lock_oid = ObjectHandle::new(self.pool.clone(), "csi.journal.regen.lock");
        let lock_name = format!("{}:{id}", self.kind.oid_name());
        self.locks
            .try_acquire(&self.ctx, &lock_oid, &lock_name, &self.owner, Default::default())
            .await?;

        let oid = ObjectHandle::new(self.pool.clone(), self.kind.oid_name());
        let mut refs = BTreeSet::new();
        refs.insert(id.to_string());
        let result = self.tracker.add(&self.ctx, &oid, &refs, RetryPolicy::default()).await;

        self.locks.release(&self.ctx, &lock_oid, &lock_name, &self.owner).await?;
        result?;
        info!(id, kind = ?self.kind, "journal entry regenerated");
        Ok(Phase::Done)
    }
}
