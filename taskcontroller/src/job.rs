use crate::error::TaskError;
use crate::outcome::TaskOutcome;
use crate::spec::SubprocessSpec;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// A unit of long-running, cancellable work managed by a `TaskController`
/// (spec §4.E).
#[async_trait]
pub trait TaskJob: Send + Sync {
    /// Begins asynchronous execution. Safe to call exactly once; a second
    /// call returns `TaskError::AlreadyStarted` rather than double-spawning.
    fn start(self: std::sync::Arc<Self>) -> Result<(), TaskError>;

    /// Lock-free observation of aliveness.
    fn running(&self) -> bool;

    /// True iff the task terminated, exited with status zero, and its
    /// captured output contains no substring `"error"`.
    fn success(&self) -> bool;

    /// Idempotent: cancels the cooperative context and releases credentials.
    fn stop(&self);

    /// Terminal error, if the task finished and did not succeed.
    fn error(&self) -> Option<TaskError>;

    /// Tagged classification of a finished run (spec §9 "Dynamic error
    /// conversion"). `None` while still running.
    fn outcome(&self) -> Option<TaskOutcome>;
}

struct Finished {
    exit_code: Option<i32>,
    outcome: TaskOutcome,
}

/// `TaskJob` backed by a subprocess started in its own process group with
/// parent-death signaling, following the backup/restore pattern (spec
/// §4.E).
pub struct SubprocessTaskJob {
    spec: SubprocessSpec,
    started: AtomicBool,
    running: AtomicBool,
    output: Mutex<String>,
    credentials: Mutex<Option<String>>,
    finished: Mutex<Option<Finished>>,
    cancel: CancellationToken,
}

impl SubprocessTaskJob {
    pub fn new(spec: SubprocessSpec, credentials: String) -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self {
            spec,
            started: AtomicBool::new(false),
            running: AtomicBool::new(false),
            output: Mutex::new(String::new()),
            credentials: Mutex::new(Some(credentials)),
            finished: Mutex::new(None),
            cancel: CancellationToken::new(),
        })
    }

    fn build_command(&self) -> Command {
        let mut command = Command::new(&self.spec.client_path);
        command
            .args(self.spec.args())
            .env("TIMEOUT", self.spec.timeout.as_secs().to_string())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        {
            // New process group, and ask the kernel to kill the child if we
            // die first, so it never outlives a crashed parent (spec §9
            // "Subprocess lifetime and process groups").
            unsafe {
                command.pre_exec(|| {
                    if libc::setpgid(0, 0) != 0 {
                        return Err(std::io::Error::last_os_error());
                    }
                    libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGKILL);
                    Ok(())
                });
            }
        }

        command
    }

    async fn run(self: std::sync::Arc<Self>) {
        let mut command = self.build_command();
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                let message = format!("spawn failed: {e}");
                self.finish(None, TaskOutcome::Other(-1, message.clone()), message);
                return;
            }
        };

        let stdout = child.stdout.take().expect("piped stdout");
        let stderr = child.stderr.take().expect("piped stderr");
        let out_buf = std::sync::Arc::new(tokio::sync::Mutex::new(String::new()));

        let stdout_task = tokio::spawn(stream_into(out_buf.clone(), stdout, "stdout"));
        let stderr_task = tokio::spawn(stream_into(out_buf.clone(), stderr, "stderr"));

        tokio::select! {
            _ = self.cancel.cancelled() => {
                warn!("task cancelled, killing subprocess");
                let _ = child.start_kill();
                let _ = child.wait().await;
                let _ = stdout_task.await;
                let _ = stderr_task.await;
                let output = out_buf.lock().await.clone();
                self.finish(None, TaskOutcome::Other(-1, output.clone()), output);
            }
            status = child.wait() => {
                let _ = stdout_task.await;
                let _ = stderr_task.await;
                let output = out_buf.lock().await.clone();
                match status {
                    Ok(status) => {
                        let code = status.code().unwrap_or(-1);
                        let outcome = TaskOutcome::from_exit(code, output.clone());
                        self.finish(Some(code), outcome, output);
                    }
                    Err(e) => {
                        let message = format!("wait failed: {e}");
                        self.finish(None, TaskOutcome::Other(-1, message.clone()), message);
                    }
                }
            }
        }
    }

    fn finish(&self, exit_code: Option<i32>, outcome: TaskOutcome, output: String) {
        *self.output.lock().expect("output mutex poisoned") = output;
        info!(?exit_code, ?outcome, "task finished");
        *self.finished.lock().expect("finished mutex poisoned") = Some(Finished { exit_code, outcome });
        self.running.store(false, Ordering::Release);
    }
}

async fn stream_into<R>(buf: std::sync::Arc<tokio::sync::Mutex<String>>, reader: R, label: &'static str)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!(stream = label, %line, "subprocess output");
        let mut guard = buf.lock().await;
        guard.push_str(&line);
        guard.push('\n');
    }
}

#[async_trait]
impl TaskJob for SubprocessTaskJob {
    #[instrument(skip(self))]
    fn start(self: std::sync::Arc<Self>) -> Result<(), TaskError> {
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(TaskError::AlreadyStarted);
        }
        self.running.store(true, Ordering::Release);
        tokio::spawn(self.clone().run());
        Ok(())
    }

    fn running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn success(&self) -> bool {
        let finished = self.finished.lock().expect("finished mutex poisoned");
        match finished.as_ref() {
            Some(Finished { exit_code: Some(0), .. }) => {
                // Preserves a quirk relied on by callers: combined output is
                // scanned for the literal substring "error" in addition to
                // exit status (spec §9 open question).
                let output = self.output.lock().expect("output mutex poisoned");
                !output.contains("error")
            }
            _ => false,
        }
    }

    fn stop(&self) {
        self.cancel.cancel();
        self.credentials.lock().expect("credentials mutex poisoned").take();
    }

    fn error(&self) -> Option<TaskError> {
        let exit_code = {
            let finished = self.finished.lock().expect("finished mutex poisoned");
            let f = finished.as_ref()?;
            if matches!(f.outcome, TaskOutcome::NotFound) {
                return None;
            }
            f.exit_code.unwrap_or(-1)
        };
        if self.success() {
            return None;
        }
        let output = self.output.lock().expect("output mutex poisoned").clone();
        Some(TaskError::Process {
            code: exit_code,
            output,
        })
    }

    fn outcome(&self) -> Option<TaskOutcome> {
        self.finished
            .lock()
            .expect("finished mutex poisoned")
            .as_ref()
            .map(|f| f.outcome.clone())
    }
}
