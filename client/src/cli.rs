use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use common::{app, engine, JobDoneResponse, JobInfo, JobResults, TaskStatus};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::{path::PathBuf, time::Duration};
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "client")]
#[command(about = "CLI simple para hablar con el coordinador MapReduce")]
struct Cli {
    /// URL base del coordinador
    #[arg(
        long,
        env = "MR_COORDINATOR_URL",
        default_value = "http://localhost:8080"
    )]
    coordinator: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estado del job: fase, contadores y tareas
    Status,
    /// Pregunta una vez si el job terminó (IsDone)
    Done,
    /// Espera hasta que el coordinador diga que el job terminó
    Wait {
        /// Segundos entre consultas
        #[arg(long, default_value_t = 1)]
        interval: u64,
    },
    /// Lista los archivos de salida por bucket
    Results,
    /// Corre el job completo en este proceso, sin coordinador ni workers
    Sequential {
        #[arg(long, default_value = "wordcount")]
        app: String,

        /// Archivo de salida
        #[arg(long, default_value = "mr-correct.txt")]
        output: PathBuf,

        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<PathBuf>,
    },
}

async fn get_json<T: DeserializeOwned>(client: &Client, base_url: &str, path: &str) -> Result<T> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), path);
    debug!("GET {}", url);

    let resp = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("no se pudo contactar al coordinador en {}", base_url))?;

    if !resp.status().is_success() {
        bail!("error consultando {} (status {})", path, resp.status());
    }
    Ok(resp.json().await?)
}

fn print_status(job: &JobInfo) {
    println!("Job:");
    println!("  fase: {:?}", job.phase);
    println!("  n_map: {}, n_reduce: {}", job.n_map, job.n_reduce);
    println!(
        "  tareas: total={}, pendientes={}, en_progreso={}, completadas={}",
        job.total_tasks, job.pending_tasks, job.in_progress_tasks, job.completed_tasks
    );

    if job.total_tasks > 0 {
        let pct = (job.completed_tasks as f64 / job.total_tasks as f64) * 100.0;
        println!("  progreso: {:.1}%", pct);
    } else {
        println!("  progreso: (sin tareas)");
    }

    println!("  requests: {}", job.request_count);
    println!("  iniciado: {}", job.started_at);
    println!("  archivos producidos: {}", job.produced_files.len());

    // sólo las que no están DONE, con todas es demasiado ruido
    let open: Vec<_> = job
        .tasks
        .iter()
        .filter(|t| t.task.status != TaskStatus::Done)
        .collect();
    if !open.is_empty() {
        println!("  abiertas:");
        for t in open {
            let since = t
                .assigned_at
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "    - {} {:?} {:?} (asignaciones={}, desde={})",
                t.task.id, t.task.kind, t.task.status, t.assignments, since
            );
        }
    }
}

fn print_results(results: &JobResults) {
    println!("Resultados:");
    println!("  directorio de trabajo: {}", results.work_dir);
    for (bucket, out) in results.outputs.iter().enumerate() {
        match out {
            Some(f) => println!("    - bucket {}: {}", bucket, f),
            None => println!("    - bucket {}: (pendiente)", bucket),
        }
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new();
    let base_url = cli.coordinator;

    match cli.command {
        Commands::Status => {
            let job: JobInfo = get_json(&client, &base_url, "/api/v1/job").await?;
            print_status(&job);
        }

        Commands::Done => {
            let resp: JobDoneResponse = get_json(&client, &base_url, "/api/v1/job/done").await?;
            println!("{}", resp.done);
        }

        Commands::Wait { interval } => {
            let interval = Duration::from_secs(interval.max(1));
            loop {
                let resp: JobDoneResponse =
                    get_json(&client, &base_url, "/api/v1/job/done").await?;
                if resp.done {
                    info!("el coordinador reporta el job terminado");
                    break;
                }
                tokio::time::sleep(interval).await;
            }
            let results: JobResults = get_json(&client, &base_url, "/api/v1/job/results").await?;
            print_results(&results);
        }

        Commands::Results => {
            let results: JobResults = get_json(&client, &base_url, "/api/v1/job/results").await?;
            print_results(&results);
        }

        Commands::Sequential {
            app: app_name,
            output,
            inputs,
        } => {
            let Some(mr_app) = app::lookup(&app_name) else {
                bail!(
                    "app desconocida '{}' (disponibles: {})",
                    app_name,
                    app::app_names().join(", ")
                );
            };

            println!("Ejecutando {} secuencial:", mr_app.name);
            println!("  entradas: {}", inputs.len());
            println!("  salida  : {}", output.display());

            let output_for_task = output.clone();
            let rows = tokio::task::spawn_blocking(move || {
                engine::run_sequential(mr_app, &inputs, &output_for_task)
            })
            .await??;

            println!("Listo: {} claves en {}", rows, output.display());
        }
    }

    Ok(())
}
