use std::path::PathBuf;
use std::time::Duration;

/// Describes the subprocess a `SubprocessTaskJob` launches (spec §6
/// "Subprocess contract"): a backend-client path, an operation flag, a
/// pool/image argument, credential flags, and a monitor address list.
#[derive(Debug, Clone)]
pub struct SubprocessSpec {
    pub client_path: PathBuf,
    pub operation: String,
    pub pool: String,
    pub image: String,
    pub id: String,
    pub keyfile: Option<PathBuf>,
    pub monitors: Vec<String>,
    /// `TIMEOUT` env var consumed by the subprocess (spec §6), default 30s.
    pub timeout: Duration,
}

impl SubprocessSpec {
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            self.operation.clone(),
            "--pool".to_string(),
            self.pool.clone(),
            "--image".to_string(),
            self.image.clone(),
            "--id".to_string(),
            self.id.clone(),
        ];
        if let Some(keyfile) = &self.keyfile {
            args.push("--keyfile".to_string());
            args.push(keyfile.display().to_string());
        }
        if !self.monitors.is_empty() {
            args.push("-m".to_string());
            args.push(self.monitors.join(","));
        }
        args
    }
}
