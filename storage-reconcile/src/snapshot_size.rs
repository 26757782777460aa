use crate::error::ReconcileError;
use crate::phase::Phase;
use crate::workflow::Workflow;
use async_trait::async_trait;
use objectstore::{ObjectHandle, ObjectStoreContext};
use std::sync::Arc;
use tracing::info;

const SIZE_XATTR: &str = "ceph-csi.snapshot.size-bytes";

/// Resolves the current backing size of a snapshot and persists it as an
/// xattr on its coordination object, retrying on a version race (spec
/// §4.F, synchronous metadata flow dispatching to (A)/(B)).
pub struct SnapshotSizeWorkflow {
    pub pool: String,
    pub ctx: Arc<ObjectStoreContext>,
    pub resolve_size: Arc<dyn Fn(&str) -> u64 + Send + Sync>,
    pub max_attempts: u32,
}

#[async_trait]
impl Workflow for SnapshotSizeWorkflow {
    fn finalizer_name(&self) -> &str {
        "storage-core.ceph-csi/snapshot-size-update"
    }

    async fn cleanup(&self, _id: &str) -> Result<(), ReconcileError> {
        Ok(())
    }

    async fn run(&self, id: &str) -> Result<Phase, ReconcileError> {
        let oid = ObjectHandle::new(self.pool.clone(), id);
        let size = (self.resolve_size)(id);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let version = self.ctx.stat(&oid).await?;
            let result = self
                .ctx
                .create_write_op()
                .assert_version(version)
                .set_xattr(SIZE_XATTR, size.to_be_bytes().to_vec())
                .operate(&self.ctx, &oid)
                .await;

            match result {
                Ok(()) => {
                    info!(id, size, "snapshot size updated");
                    return Ok(Phase::Done);
                }
                Err(e) if e.is_version_race() && attempt < self.max_attempts => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}
