use anyhow::{Context, Result};
use common::{engine, MrApp, ProducedFile, Task, TaskKind};
use std::{path::PathBuf, time::Duration};
use tokio::time::sleep;
use tracing::{error, info};

use crate::client::CoordinatorClient;

/// Espera fija tras recibir WAIT.
pub const WAIT_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub work_dir: PathBuf,
    pub backoff: Duration,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            backoff: WAIT_BACKOFF,
        }
    }
}

/// Lo que hizo un worker antes de apagarse.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSummary {
    pub maps: u32,
    pub reduces: u32,
    pub waits: u32,
}

/// Loop principal del worker:
/// - pide tarea al coordinador
/// - SHUTDOWN (o coordinador caído): termina bien
/// - WAIT: duerme `backoff` y vuelve a pedir
/// - MAP / REDUCE: ejecuta el pipeline (una tarea a la vez) y reporta
///
/// Si un pipeline falla no se reporta nada: el lease vence y otro worker
/// la toma. El error se devuelve para que el proceso termine.
pub async fn run_worker(
    client: &CoordinatorClient,
    app: MrApp,
    opts: &WorkerOptions,
) -> Result<WorkerSummary> {
    let mut summary = WorkerSummary::default();

    loop {
        let Some(assignment) = client.request_task().await? else {
            info!("coordinador no disponible, asumiendo job terminado");
            return Ok(summary);
        };
        let task = assignment.task;

        match task.kind {
            TaskKind::Shutdown => {
                info!(
                    "worker {} recibió SHUTDOWN ({} map, {} reduce)",
                    client.worker_id(),
                    summary.maps,
                    summary.reduces
                );
                return Ok(summary);
            }
            TaskKind::Wait => {
                summary.waits += 1;
                sleep(opts.backoff).await;
            }
            TaskKind::Map => {
                info!("tengo tarea map {} (input={:?})", task.id, task.input_file);
                let produced = execute_map(&task, app, opts).await.map_err(|e| {
                    error!("falló la tarea map {}: {:#}", task.id, e);
                    e
                })?;
                client.report_task_done(&task, produced).await?;
                summary.maps += 1;
            }
            TaskKind::Reduce => {
                info!(
                    "tengo tarea reduce {} (bucket={:?}, {} intermedios)",
                    task.id,
                    task.reduce_bucket,
                    assignment.intermediate_files.len()
                );
                let produced = execute_reduce(&task, assignment.intermediate_files, app, opts)
                    .await
                    .map_err(|e| {
                        error!("falló la tarea reduce {}: {:#}", task.id, e);
                        e
                    })?;
                client.report_task_done(&task, vec![produced]).await?;
                summary.reduces += 1;
            }
        }
    }
}

// El pipeline hace I/O bloqueante: lo corremos en un hilo de bloqueo.
async fn execute_map(task: &Task, app: MrApp, opts: &WorkerOptions) -> Result<Vec<ProducedFile>> {
    let task = task.clone();
    let work_dir = opts.work_dir.clone();

    tokio::task::spawn_blocking(move || engine::run_map_task(&task, app.map, &work_dir))
        .await
        .context("panic o join error en el pipeline map")?
}

async fn execute_reduce(
    task: &Task,
    intermediate_files: Vec<String>,
    app: MrApp,
    opts: &WorkerOptions,
) -> Result<ProducedFile> {
    let task = task.clone();
    let work_dir = opts.work_dir.clone();

    tokio::task::spawn_blocking(move || {
        engine::run_reduce_task(&task, &intermediate_files, app.reduce, &work_dir)
    })
    .await
    .context("panic o join error en el pipeline reduce")?
}
