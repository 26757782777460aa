use crate::error::HealthCheckError;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{oneshot, RwLock};
use tokio::time::Instant;
use tracing::warn;

const HEARTBEAT_FILE: &str = ".csi-health-checker";

pub(crate) const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
struct State {
    healthy: bool,
    error: Option<String>,
    last_update: Option<Instant>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            healthy: true,
            error: None,
            last_update: None,
        }
    }
}

/// A single volume's liveness probe (spec §4.G): every `interval`, writes a
/// timestamp into a heartbeat file under the volume path and reads it back,
/// recording the outcome under `state`. `IsHealthy` reads that record and
/// additionally treats a loop that has gone quiet for longer than
/// `interval + timeout` as unhealthy, independent of the last recorded
/// outcome.
pub struct HealthChecker {
    volume_path: PathBuf,
    interval: Duration,
    timeout: Duration,
    state: Arc<RwLock<State>>,
    stop: Mutex<Option<oneshot::Sender<()>>>,
}

impl HealthChecker {
    pub fn new(volume_path: PathBuf, interval: Duration, timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            volume_path,
            interval,
            timeout,
            state: Arc::new(RwLock::new(State::default())),
            stop: Mutex::new(None),
        })
    }

    pub fn with_defaults(volume_path: PathBuf) -> Arc<Self> {
        Self::new(volume_path, DEFAULT_INTERVAL, DEFAULT_TIMEOUT)
    }

    /// Spawns the cooperative probe loop. Calling `start` on an
    /// already-running checker is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut stop = self.stop.lock().unwrap();
        if stop.is_some() {
            return;
        }
        let (tx, mut rx) = oneshot::channel();
        *stop = Some(tx);
        drop(stop);

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(this.interval);
            ticker.tick().await; // first tick fires immediately; consume it before the loop
            loop {
                tokio::select! {
                    _ = &mut rx => return,
                    _ = ticker.tick() => this.probe_once().await,
                }
            }
        });
    }

    /// Signals the loop to exit after its current tick. Idempotent.
    pub fn stop(&self) {
        if let Some(tx) = self.stop.lock().unwrap().take() {
            let _ = tx.send(());
        }
    }

    async fn probe_once(&self) {
        let outcome = self.write_and_read_back().await;
        let mut state = self.state.write().await;
        match outcome {
            Ok(()) => {
                state.healthy = true;
                state.error = None;
            }
            Err(e) => {
                warn!(path = %self.volume_path.display(), error = %e, "volume health probe failed");
                state.healthy = false;
                state.error = Some(e.to_string());
            }
        }
        state.last_update = Some(Instant::now());
    }

    async fn write_and_read_back(&self) -> Result<(), HealthCheckError> {
        let marker = self.volume_path.join(HEARTBEAT_FILE);
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let written = now.to_string();
        tokio::fs::write(&marker, &written)
            .await
            .map_err(|e| HealthCheckError::Io(e.to_string()))?;
        let read_back = tokio::fs::read_to_string(&marker)
            .await
            .map_err(|e| HealthCheckError::Io(e.to_string()))?;
        if read_back != written {
            return Err(HealthCheckError::Mismatch);
        }
        Ok(())
    }

    /// Forces one probe immediately, bypassing the interval ticker. Used by
    /// tests and by callers that want a synchronous first reading.
    pub async fn probe_now(&self) {
        self.probe_once().await;
    }

    pub async fn is_healthy(&self) -> (bool, Option<String>) {
        let state = self.state.read().await;
        if let Some(last_update) = state.last_update {
            let staleness_bound = self.interval + self.timeout;
            let elapsed = last_update.elapsed();
            if elapsed > staleness_bound {
                return (false, Some(format!("no response for {} seconds", elapsed.as_secs())));
            }
        }
        (state.healthy, state.error.clone())
    }
}
