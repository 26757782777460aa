#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("task already started")]
    AlreadyStarted,

    #[error("task already registered under name '{0}'")]
    AlreadyRegistered(String),

    #[error("no task registered under name '{0}'")]
    NotFound(String),

    #[error("failed to spawn subprocess: {0}")]
    Spawn(String),

    #[error("task has not terminated yet")]
    NotTerminated,

    #[error("process exited with code {code}: {output}")]
    Process { code: i32, output: String },
}
