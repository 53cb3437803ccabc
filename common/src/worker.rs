use serde::{Deserialize, Serialize};

use crate::task::Task;

pub type WorkerId = String;

/// Archivo producido por una tarea, con el bucket al que pertenece.
/// El bucket viaja explícito: el coordinador nunca parsea nombres de archivo.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProducedFile {
    pub name: String,
    pub bucket: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAssignmentRequest {
    /// Sólo para logs, el coordinador no guarda estado por worker
    pub worker_id: WorkerId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAssignmentResponse {
    pub task: Task,
    /// Archivos intermedios del bucket (sólo en asignaciones REDUCE)
    #[serde(default)]
    pub intermediate_files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCompleteRequest {
    pub worker_id: WorkerId,
    pub task: Task,
    #[serde(default)]
    pub produced_files: Vec<ProducedFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCompleteResponse {
    pub ok: bool,
}
