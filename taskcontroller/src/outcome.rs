/// Tagged classification of a finished subprocess, replacing the scattered
/// numeric exit-code checks a naive port would have (spec §9 "Dynamic error
/// conversion"): reconcilers match on this instead of raw codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Exit code 0.
    Success,
    /// Exit code 16: backend reports the target resource is in use. The
    /// reconciler treats this as retryable, not a terminal failure.
    InUse,
    /// Exit code 2: nothing to do, treated as idempotent success.
    NotFound,
    /// Any other exit code, carried with the captured combined output.
    Other(i32, String),
}

impl TaskOutcome {
    pub fn from_exit(code: i32, output: String) -> Self {
        match code {
            0 => TaskOutcome::Success,
            2 => TaskOutcome::NotFound,
            16 => TaskOutcome::InUse,
            other => TaskOutcome::Other(other, output),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, TaskOutcome::InUse)
    }

    pub fn is_terminal_failure(&self) -> bool {
        matches!(self, TaskOutcome::Other(_, _))
    }
}
