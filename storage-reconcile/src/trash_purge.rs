use crate::error::ReconcileError;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{info, warn};

struct PoolSchedule {
    interval: Duration,
    next_due: Instant,
}

/// Per-pool trash-purge schedule (spec §4.F): for every pool observed among
/// storage classes, run a one-shot purge subprocess when its next-due time
/// arrives. A fixed interval stands in for the cron expression a full
/// implementation would parse; the due-time bookkeeping is the same either
/// way.
pub struct TrashPurgeScheduler {
    client_path: PathBuf,
    default_interval: Duration,
    schedules: Mutex<HashMap<String, PoolSchedule>>,
}

impl TrashPurgeScheduler {
    pub fn new(client_path: PathBuf, default_interval: Duration) -> Self {
        Self {
            client_path,
            default_interval,
            schedules: Mutex::new(HashMap::new()),
        }
    }

    /// Registers `pool` if not already scheduled, due immediately.
    pub async fn observe_pool(&self, pool: &str) {
        let mut schedules = self.schedules.lock().await;
        schedules.entry(pool.to_string()).or_insert(PoolSchedule {
            interval: self.default_interval,
            next_due: Instant::now(),
        });
    }

    /// Runs the purge for every due pool. Intended to be called on a
    /// short-period ticker by the owning manager loop.
    pub async fn run_due(&self) {
        let due_pools: Vec<String> = {
            let schedules = self.schedules.lock().await;
            let now = Instant::now();
            schedules
                .iter()
                .filter(|(_, s)| now >= s.next_due)
                .map(|(pool, _)| pool.clone())
                .collect()
        };

        for pool in due_pools {
            match self.purge_pool(&pool).await {
                Ok(()) => info!(pool, "trash purge succeeded"),
                Err(e) => warn!(pool, error = %e, "trash purge failed, will retry"),
            }
            let mut schedules = self.schedules.lock().await;
            if let Some(schedule) = schedules.get_mut(&pool) {
                schedule.next_due = Instant::now() + schedule.interval;
            }
        }
    }

    async fn purge_pool(&self, pool: &str) -> Result<(), ReconcileError> {
        let output = Command::new(&self.client_path)
            .args(["trash", "purge", "--pool", pool])
            .output()
            .await
            .map_err(|e| ReconcileError::Backend(format!("spawn failed: {e}")))?;

        match output.status.code() {
            Some(0) => Ok(()),
            // Nothing to do: idempotent success (spec §4.F).
            Some(2) => Ok(()),
            Some(code) => Err(ReconcileError::Backend(format!(
                "purge exited {code}: {}",
                String::from_utf8_lossy(&output.stderr)
            ))),
            None => Err(ReconcileError::Backend("purge terminated by signal".to_string())),
        }
    }
}
