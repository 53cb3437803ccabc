use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobPhase {
    Map,
    Reduce,
    Finished,
}

/// Vista de una tarea del registro tal como la expone el coordinador.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInfo {
    pub task: Task,
    /// Cuándo se asignó por última vez (None si nunca)
    pub assigned_at: Option<DateTime<Utc>>,
    /// Cuántas veces se asignó (cada asignación abre un lease nuevo)
    pub assignments: u32,
}

/// Snapshot de sólo lectura del job completo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInfo {
    pub phase: JobPhase,
    pub n_map: u32,
    pub n_reduce: u32,

    /// -------- Métricas del job --------
    pub started_at: DateTime<Utc>,
    pub total_tasks: u32,
    pub pending_tasks: u32,
    pub in_progress_tasks: u32,
    pub completed_tasks: u32,
    pub request_count: u64,

    /// Archivos reportados por tareas completadas (puede tener duplicados)
    pub produced_files: Vec<String>,
    pub tasks: Vec<TaskInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDoneResponse {
    pub done: bool,
}
