use anyhow::{bail, Context, Result};
use clap::Parser;
use glob::glob;
use std::{net::SocketAddr, path::PathBuf, time::Duration};

use crate::state::Timing;
use crate::STABILITY_WINDOW;

#[derive(Parser, Debug, Clone)]
#[command(name = "coordinator")]
#[command(about = "Coordinador MapReduce: reparte tareas map/reduce entre workers")]
pub struct Config {
    /// Dirección donde escucha el servicio HTTP
    #[arg(long, env = "MR_LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Número de buckets / tareas reduce
    #[arg(long, env = "MR_N_REDUCE", default_value_t = 10)]
    pub n_reduce: u32,

    /// Segundos antes de reasignar una tarea sin reporte
    #[arg(long, env = "MR_LEASE_SECS", default_value_t = 10)]
    pub lease_secs: u64,

    /// Directorio compartido de intermedios y salidas (sólo informativo aquí)
    #[arg(long, env = "MR_WORK_DIR", default_value = ".")]
    pub work_dir: PathBuf,

    /// Archivos de entrada o patrones glob, ej: "data/pg-*.txt"
    #[arg(value_name = "INPUT", required = true)]
    pub inputs: Vec<String>,
}

impl Config {
    pub fn timing(&self) -> Timing {
        Timing {
            lease: Duration::from_secs(self.lease_secs),
            stability_window: STABILITY_WINDOW,
        }
    }

    /// Expande los patrones en orden; dentro de un patrón, orden alfabético.
    /// Un patrón que no coincide con ningún archivo es un error.
    pub fn expand_inputs(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();

        for pattern in &self.inputs {
            let mut matched = 0;
            for entry in glob(pattern).with_context(|| format!("patrón inválido {}", pattern))? {
                let path = entry?;
                if path.is_file() {
                    files.push(path.to_string_lossy().to_string());
                    matched += 1;
                }
            }
            if matched == 0 {
                bail!("el patrón {} no coincide con ningún archivo", pattern);
            }
        }

        Ok(files)
    }
}
