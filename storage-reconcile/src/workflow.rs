use crate::action::Action;
use crate::error::ReconcileError;
use crate::object::ReconcileObject;
use crate::phase::Phase;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use volumelocks::VolumeLocks;

/// One of {Backup, Restore, Trash-Purge, Journal-Regeneration-for-Volume,
/// Journal-Regeneration-for-VolumeGroup, Snapshot-Size-Update} (spec §4.F).
/// Each workflow supplies only the parts that differ; `drive` runs the
/// uniform skeleton common to all of them.
#[async_trait]
pub trait Workflow: Send + Sync {
    /// Sentinel recorded on the object while this workflow owns it.
    fn finalizer_name(&self) -> &str;

    /// Stops any in-flight task/op and releases workflow-owned resources
    /// for `id`. Called when the object carries a deletion-timestamp.
    async fn cleanup(&self, id: &str) -> Result<(), ReconcileError>;

    /// Performs (or advances) the work itself, run with the volume lock
    /// held. Returns the phase the object should move to.
    async fn run(&self, id: &str) -> Result<Phase, ReconcileError>;
}

/// Runs the uniform reconciliation skeleton (spec §4.F steps 1-7) for one
/// object against one workflow. Step 1 (fetch the object) is the caller's
/// responsibility: `object` is already in hand here.
#[instrument(skip(workflow, object, locks), fields(id = tracing::field::Empty))]
pub async fn drive(
    workflow: &dyn Workflow,
    object: &mut dyn ReconcileObject,
    locks: &Arc<VolumeLocks>,
) -> Action {
    let id = object.stable_id();
    tracing::Span::current().record("id", &tracing::field::display(&id));

    if object.deletion_timestamp().is_some() {
        match workflow.cleanup(&id).await {
            Ok(()) => {
                locks.release(&id);
                object.remove_finalizer(workflow.finalizer_name());
                return Action::Await;
            }
            Err(e) => {
                warn!(error = %e, "cleanup failed, will retry");
                return Action::requeue_secs(5);
            }
        }
    }

    if object.phase().is_terminal() {
        return Action::Await;
    }

    if let Err(e) = locks.try_acquire(&id) {
        info!(error = %e, "volume busy, requeueing");
        return Action::requeue_secs(2);
    }
    object.add_finalizer(workflow.finalizer_name());

    let result = workflow.run(&id).await;
    locks.release(&id);

    match result {
        // Long-running flows report back `Running` while a task is still in
        // flight; there is no external watch to wake us when it finishes, so
        // come back on a short timer rather than waiting forever.
        Ok(Phase::Running) => {
            object.set_phase(Phase::Running);
            Action::requeue_secs(5)
        }
        Ok(phase) => {
            object.set_phase(phase);
            Action::Await
        }
        Err(ReconcileError::InUseRetry) => Action::requeue_secs(5),
        Err(e) => {
            warn!(error = %e, "workflow run failed");
            object.set_phase(Phase::Failed);
            Action::Await
        }
    }
}
