pub mod config;
pub mod handlers;
pub mod lease;
pub mod monitor;
pub mod state;

use std::{future::Future, time::Duration};

use anyhow::{Context, Result};
use tokio::{net::TcpListener, sync::oneshot};
use tracing::{info, warn};

pub use config::Config;
pub use state::{AppState, Registry, Timing};

pub const LEASE_TIMEOUT: Duration = Duration::from_secs(10);
pub const STABILITY_WINDOW: Duration = Duration::from_secs(1);
pub const DONE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Sirve el API HTTP sobre `listener` hasta que `shutdown` se resuelva.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = handlers::build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Driver del job: crea el registro, sirve, y sale cuando `is_done` da true
/// (o con Ctrl-C).
pub async fn run(config: Config) -> Result<()> {
    let inputs = config.expand_inputs()?;
    let registry = Registry::new(inputs, config.n_reduce, config.timing())?;

    let state = AppState {
        registry: registry.clone(),
        work_dir: config.work_dir.clone(),
    };

    let listener = TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("no se pudo escuchar en {}", config.listen))?;
    info!("coordinador escuchando en {}", listener.local_addr()?);

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(serve(listener, state, async move {
        let _ = stop_rx.await;
    }));

    tokio::select! {
        _ = registry.wait_until_done(DONE_POLL_INTERVAL) => {
            info!("todas las tareas terminadas, apagando coordinador");
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Ctrl-C recibido, apagando con el job sin terminar");
        }
    }

    let _ = stop_tx.send(());
    server.await??;
    Ok(())
}
