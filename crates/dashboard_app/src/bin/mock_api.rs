//! Mock scrape backend: serves the job store over HTTP until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use scrape_engine::{JobStore, JsonFileRepository, ServerSettings, TokioScheduler};
use scrape_logging::{level_from_env, scrape_info, scrape_warn, LogDestination};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    scrape_logging::initialize(LogDestination::Both, level_from_env());

    let settings = ServerSettings::from_env().context("reading mock API settings")?;
    let repository = JsonFileRepository::open(&settings.db_path)
        .with_context(|| format!("opening job database {:?}", settings.db_path))?;
    scrape_info!(
        "Job database at {:?}, response delay {:?}, failure rate {}",
        repository.path(),
        settings.response_delay,
        settings.store.failure_rate
    );

    let store = Arc::new(JobStore::new(
        Arc::new(repository),
        Arc::new(TokioScheduler::current()),
        settings.store.clone(),
    ));

    scrape_engine::run(store, &settings, shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => scrape_info!("Received Ctrl+C, shutting down"),
        Err(err) => {
            scrape_warn!("Could not listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    }
}
