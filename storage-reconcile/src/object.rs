use crate::phase::Phase;
use chrono::{DateTime, Utc};

/// Minimal surface a reconciled object must expose (spec §6 "Reconciler
/// external inputs"): name/namespace folded into a stable id, phase,
/// deletion-timestamp, and finalizers.
pub trait ReconcileObject: Send + Sync {
    fn stable_id(&self) -> String;
    fn phase(&self) -> Phase;
    fn set_phase(&mut self, phase: Phase);
    fn deletion_timestamp(&self) -> Option<DateTime<Utc>>;
    fn finalizers(&self) -> &[String];
    fn add_finalizer(&mut self, name: &str);
    fn remove_finalizer(&mut self, name: &str);
}
