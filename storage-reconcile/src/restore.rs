use crate::credentials::CredentialsSource;
use crate::error::ReconcileError;
use crate::phase::Phase;
use crate::workflow::Workflow;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use taskcontroller::{SubprocessTaskJob, SubprocessSpec, TaskController, TaskOutcome};
use tracing::{info, warn};

const FINALIZER: &str = "storage-core.ceph-csi/restore";

/// Same shape as `BackupWorkflow`, running the restore side of the
/// subprocess client (spec §4.E, §4.F).
pub struct RestoreWorkflow {
    pub client_path: PathBuf,
    pub pool: String,
    pub timeout: Duration,
    pub tasks: Arc<TaskController>,
    pub credentials: Arc<dyn CredentialsSource>,
}

#[async_trait]
impl Workflow for RestoreWorkflow {
    fn finalizer_name(&self) -> &str {
        FINALIZER
    }

    async fn cleanup(&self, id: &str) -> Result<(), ReconcileError> {
        if let Some(job) = self.tasks.get(id).await {
            job.stop();
            for _ in 0..20 {
                if !job.running() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            self.tasks.delete(id).await;
        }
        Ok(())
    }

    async fn run(&self, id: &str) -> Result<Phase, ReconcileError> {
        if let Some(job) = self.tasks.get(id).await {
            if job.running() {
                return Ok(Phase::Running);
            }
            let outcome = job.outcome();
            if matches!(outcome, Some(TaskOutcome::InUse)) {
                self.tasks.delete(id).await;
                return Err(ReconcileError::InUseRetry);
            }

            // Exit code 0 is necessary but not sufficient: `success()` also
            // rejects an "error" substring in the captured output (spec
            // §4.E, §9's must-preserve quirk), and `error()` carries that
            // detail back out for the failure log.
            let done = job.success() || matches!(outcome, Some(TaskOutcome::NotFound));
            let error = job.error();
            self.tasks.delete(id).await;
            return if done {
                info!(id, "restore completed");
                Ok(Phase::Done)
            } else {
                warn!(id, ?outcome, ?error, "restore subprocess failed");
                Ok(Phase::Failed)
            };
        }

        let creds = self.credentials.resolve(id).await?;
        let spec = SubprocessSpec {
            client_path: self.client_path.clone(),
            operation: "restore".to_string(),
            pool: self.pool.clone(),
            image: id.to_string(),
            id: creds.id,
            keyfile: creds.keyfile,
            monitors: creds.monitors,
            timeout: self.timeout,
        };
        let job = SubprocessTaskJob::new(spec, creds.secret);
        self.tasks.start(id, job).await?;
        Ok(Phase::Running)
    }
}
