use std::time::Duration;

/// What the caller's event loop should do after one reconcile pass,
/// patterned after `kube::runtime::controller::Action` without pulling in
/// a live apiserver watch: `Await` means wait for the next externally
/// observed change, `Requeue` means come back after `Duration` regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Await,
    Requeue(Duration),
}

impl Action {
    pub fn requeue_secs(secs: u64) -> Self {
        Action::Requeue(Duration::from_secs(secs))
    }
}
