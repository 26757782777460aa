use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Process-wide configuration (spec §1's "configuration loading" is an
/// external collaborator; this is the shape that collaborator hands in).
/// Layered the way the rest of this family of services does it: a TOML file
/// first, then `STORAGE_CORE__`-prefixed environment variables on top.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// Object-store pool backing all coordination objects.
    pub pool: String,
    /// Path to the external cluster client binary invoked by task jobs
    /// (spec §4.E) and the trash-purge scheduler (spec §4.F).
    pub client_path: PathBuf,
    /// This process's identity when it holds a distributed lock (spec §4.B).
    pub lock_owner: String,
    #[serde(default)]
    pub monitors: Vec<String>,
    #[serde(default)]
    pub keyfile: Option<PathBuf>,
    #[serde(default = "default_trash_purge_interval_secs")]
    pub trash_purge_interval_secs: u64,
    #[serde(default = "default_health_interval_secs")]
    pub health_interval_secs: u64,
    #[serde(default = "default_health_timeout_secs")]
    pub health_timeout_secs: u64,
}

fn default_trash_purge_interval_secs() -> u64 {
    3600
}

fn default_health_interval_secs() -> u64 {
    60
}

fn default_health_timeout_secs() -> u64 {
    15
}

impl Config {
    pub fn load(path: &PathBuf) -> figment::Result<Self> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("STORAGE_CORE__").split("__"))
            .extract()
    }

    pub fn trash_purge_interval(&self) -> Duration {
        Duration::from_secs(self.trash_purge_interval_secs)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }
}
