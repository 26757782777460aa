//! Long-running task controller (spec §4.E): a registry of named jobs, each
//! wrapping a subprocess started in its own process group with cooperative
//! cancellation and a captured output buffer.

mod error;
mod job;
mod outcome;
mod registry;
mod spec;

pub use error::TaskError;
pub use job::{SubprocessTaskJob, TaskJob};
pub use outcome::TaskOutcome;
pub use registry::TaskController;
pub use spec::SubprocessSpec;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    // `/bin/true` and `/bin/false` ignore whatever flags `SubprocessSpec::args()`
    // happens to build, so they exercise the job/registry lifecycle without
    // depending on a real backend client binary being present.

    fn spec(client_path: &str) -> SubprocessSpec {
        SubprocessSpec {
            client_path: PathBuf::from(client_path),
            operation: String::new(),
            pool: String::new(),
            image: String::new(),
            id: String::new(),
            keyfile: None,
            monitors: Vec::new(),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn start_twice_fails() {
        let job = SubprocessTaskJob::new(spec("/bin/true"), "cred".to_string());
        job.clone().start().unwrap();
        let err = job.clone().start().unwrap_err();
        assert!(matches!(err, TaskError::AlreadyStarted));
        job.stop();
    }

    #[tokio::test]
    async fn successful_exit_reports_success() {
        let job = SubprocessTaskJob::new(spec("/bin/true"), "cred".to_string());
        job.clone().start().unwrap();
        for _ in 0..100 {
            if !job.running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!job.running());
        assert!(job.success());
        assert!(job.error().is_none());
        assert_eq!(job.outcome(), Some(TaskOutcome::Success));
    }

    #[tokio::test]
    async fn nonzero_exit_reports_failure() {
        let job = SubprocessTaskJob::new(spec("/bin/false"), "cred".to_string());
        job.clone().start().unwrap();
        for _ in 0..100 {
            if !job.running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!job.success());
        assert!(job.error().is_some());
    }

    #[tokio::test]
    async fn controller_rejects_duplicate_name() {
        let controller = TaskController::new();
        let job_a: Arc<dyn TaskJob> = SubprocessTaskJob::new(spec("/bin/true"), "c".to_string());
        let job_b: Arc<dyn TaskJob> = SubprocessTaskJob::new(spec("/bin/true"), "c".to_string());

        controller.start("task-1", job_a.clone()).await.unwrap();
        let err = controller.start("task-1", job_b).await.unwrap_err();
        assert!(matches!(err, TaskError::AlreadyRegistered(_)));

        job_a.stop();
        controller.delete("task-1").await;
        assert!(!controller.contains("task-1").await);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let job = SubprocessTaskJob::new(spec("/bin/sleep"), "cred".to_string());
        job.clone().start().unwrap();
        job.stop();
        job.stop();
    }
}
