use crate::error::TaskError;
use crate::job::TaskJob;
use std::sync::Arc;
use tracing::instrument;

/// Registry of named `TaskJob`s (spec §4.E). A leaf component: reconcilers
/// construct jobs and hand them in by name, then look them up by name again
/// on the next tick; the controller never reaches back into a reconciler
/// (spec §9 "Cyclic references").
#[derive(Default)]
pub struct TaskController {
    jobs: scc::HashMap<String, Arc<dyn TaskJob>>,
}

impl TaskController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `job` under `name` and starts it. Fails without starting the
    /// job if `name` is already registered.
    #[instrument(skip(self, job))]
    pub async fn start(&self, name: &str, job: Arc<dyn TaskJob>) -> Result<(), TaskError> {
        match self.jobs.entry_async(name.to_string()).await {
            scc::hash_map::Entry::Occupied(_) => Err(TaskError::AlreadyRegistered(name.to_string())),
            scc::hash_map::Entry::Vacant(entry) => {
                job.clone().start()?;
                entry.insert_entry(job);
                Ok(())
            }
        }
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.jobs.contains_async(name).await
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn TaskJob>> {
        self.jobs.read_async(name, |_, job| job.clone()).await
    }

    pub async fn delete(&self, name: &str) -> Option<Arc<dyn TaskJob>> {
        self.jobs.remove_async(name).await.map(|(_, job)| job)
    }
}
