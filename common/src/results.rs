use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResults {
    /// Directorio de trabajo donde quedaron los archivos
    pub work_dir: String,
    /// Archivo de salida por bucket, en orden de bucket (None si aún no terminó)
    pub outputs: Vec<Option<String>>,
}
