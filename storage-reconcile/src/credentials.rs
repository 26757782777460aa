use crate::error::ReconcileError;
use async_trait::async_trait;
use std::path::PathBuf;

/// Resolved backend-access material for one subprocess invocation (spec
/// §4.F step 5 "resolve credentials and backend endpoints from an external
/// credentials source").
#[derive(Debug, Clone)]
pub struct Credentials {
    pub id: String,
    pub secret: String,
    pub keyfile: Option<PathBuf>,
    pub monitors: Vec<String>,
}

#[async_trait]
pub trait CredentialsSource: Send + Sync {
    async fn resolve(&self, stable_id: &str) -> Result<Credentials, ReconcileError>;
}

/// Fixed-credential source for tests and single-cluster deployments.
pub struct StaticCredentialsSource(pub Credentials);

#[async_trait]
impl CredentialsSource for StaticCredentialsSource {
    async fn resolve(&self, _stable_id: &str) -> Result<Credentials, ReconcileError> {
        Ok(self.0.clone())
    }
}
