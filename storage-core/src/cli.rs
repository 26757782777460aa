use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "storage-core", about = "Storage-plane core for a block/file CSI driver")]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, env = "STORAGE_CORE_CONFIG", default_value = "config/storage-core.toml")]
    pub config: PathBuf,
}
