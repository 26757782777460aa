use clap::Parser;
use objectstore::InMemoryBackend;
use std::sync::Arc;
use storage_core::{Cli, Config, StorageCore};
use storage_reconcile::{Credentials, StaticCredentialsSource};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(config))
}

async fn run(config: Config) -> anyhow::Result<()> {
    // The real cluster client is an external collaborator (spec §1); this
    // process has nothing to bind it to until one is wired in, so the
    // in-memory backend stands in as the seam described on `Backend`.
    let backend = Arc::new(InMemoryBackend::new());
    let credentials = Arc::new(StaticCredentialsSource(Credentials {
        id: config.lock_owner.clone(),
        secret: String::new(),
        keyfile: config.keyfile.clone(),
        monitors: config.monitors.clone(),
    }));

    let trash_purge_interval = config.trash_purge_interval();
    let core = Arc::new(StorageCore::new(config, backend, credentials));

    tracing::info!("storage-core started");

    let trash_purge_core = core.clone();
    let trash_purge_task = tokio::spawn(async move {
        trash_purge_core.run_trash_purge_loop(trash_purge_interval).await;
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    trash_purge_task.abort();
    Ok(())
}
