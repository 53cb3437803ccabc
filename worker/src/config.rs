use clap::Parser;
use std::{path::PathBuf, time::Duration};

use crate::worker::{WorkerOptions, WAIT_BACKOFF};

#[derive(Parser, Debug, Clone)]
#[command(name = "worker")]
#[command(about = "Worker MapReduce: pide tareas al coordinador y las ejecuta")]
pub struct WorkerConfig {
    /// URL base del coordinador
    /// - En Docker: MR_COORDINATOR_URL=http://coordinator:8080
    #[arg(long, env = "MR_COORDINATOR_URL", default_value = "http://localhost:8080")]
    pub coordinator: String,

    /// Aplicación a ejecutar (wordcount, indexer)
    #[arg(long, env = "MR_APP", default_value = "wordcount")]
    pub app: String,

    /// Directorio compartido de intermedios y salidas
    #[arg(long, env = "MR_WORK_DIR", default_value = ".")]
    pub work_dir: PathBuf,

    /// Espera tras un WAIT, en milisegundos
    #[arg(long, env = "MR_BACKOFF_MS", default_value_t = WAIT_BACKOFF.as_millis() as u64)]
    pub backoff_ms: u64,
}

impl WorkerConfig {
    pub fn options(&self) -> WorkerOptions {
        WorkerOptions {
            work_dir: self.work_dir.clone(),
            backoff: Duration::from_millis(self.backoff_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_y_flags() {
        let c = WorkerConfig::parse_from(["worker"]);
        assert_eq!(c.app, "wordcount");
        assert_eq!(c.options().backoff, Duration::from_secs(1));

        let c = WorkerConfig::parse_from([
            "worker",
            "--app",
            "indexer",
            "--backoff-ms",
            "50",
            "--work-dir",
            "/tmp/mr",
        ]);
        assert_eq!(c.app, "indexer");
        assert_eq!(c.options().backoff, Duration::from_millis(50));
        assert_eq!(c.options().work_dir, PathBuf::from("/tmp/mr"));
    }
}
