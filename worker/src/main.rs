use anyhow::{anyhow, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use common::app;
use worker::{new_worker_id, run_worker, CoordinatorClient, WorkerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("worker=debug,common=debug,reqwest=info")),
        )
        .init();

    let config = WorkerConfig::parse();

    let app = app::lookup(&config.app).ok_or_else(|| {
        anyhow!(
            "aplicación desconocida {} (disponibles: {})",
            config.app,
            app::app_names().join(", ")
        )
    })?;

    let worker_id = new_worker_id();
    let client = CoordinatorClient::new(config.coordinator.clone(), worker_id.clone());
    info!(
        "worker {} arrancando contra {} (app={}, work_dir={})",
        worker_id,
        config.coordinator,
        app.name,
        config.work_dir.display()
    );

    match run_worker(&client, app, &config.options()).await {
        Ok(summary) => {
            info!("worker {} terminó: {:?}", worker_id, summary);
            Ok(())
        }
        Err(e) => {
            error!("worker {} abortado: {:#}", worker_id, e);
            std::process::exit(1);
        }
    }
}
