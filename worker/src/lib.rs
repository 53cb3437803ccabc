pub mod client;
pub mod config;
pub mod worker;

pub use client::CoordinatorClient;
pub use config::WorkerConfig;
pub use worker::{run_worker, WorkerOptions, WorkerSummary, WAIT_BACKOFF};

/// Id para logs: hostname + sufijo aleatorio (varios workers por host).
pub fn new_worker_id() -> String {
    let host = hostname::get()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", host, &suffix[..8])
}
