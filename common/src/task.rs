use serde::{Deserialize, Serialize};

pub type TaskId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskKind {
    Map,
    Reduce,
    /// Señal: fase map activa pero sin trabajo libre ahora mismo.
    Wait,
    /// Señal: el job terminó, el worker debe salir.
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Done,
}

/// Unidad de trabajo planificable.
///
/// Las tareas MAP llevan `input_file` y no tienen bucket; las REDUCE llevan
/// `reduce_bucket` en `[0, n_reduce)` y no tienen archivo de entrada.
/// WAIT y SHUTDOWN sólo viajan hacia el worker, nunca están en el registro.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub kind: TaskKind,
    pub status: TaskStatus,

    /// Archivo de entrada (sólo MAP)
    pub input_file: Option<String>,
    /// Bucket de reduce (sólo REDUCE)
    pub reduce_bucket: Option<u32>,
    /// Número total de buckets, fijo para todo el job
    pub n_reduce: u32,
}

impl Task {
    pub fn map(id: TaskId, input_file: impl Into<String>, n_reduce: u32) -> Self {
        Self {
            id,
            kind: TaskKind::Map,
            status: TaskStatus::Pending,
            input_file: Some(input_file.into()),
            reduce_bucket: None,
            n_reduce,
        }
    }

    pub fn reduce(id: TaskId, bucket: u32, n_reduce: u32) -> Self {
        Self {
            id,
            kind: TaskKind::Reduce,
            status: TaskStatus::Pending,
            input_file: None,
            reduce_bucket: Some(bucket),
            n_reduce,
        }
    }

    pub fn wait() -> Self {
        Self::signal(TaskKind::Wait)
    }

    pub fn shutdown() -> Self {
        Self::signal(TaskKind::Shutdown)
    }

    fn signal(kind: TaskKind) -> Self {
        Self {
            id: 0,
            kind,
            status: TaskStatus::Pending,
            input_file: None,
            reduce_bucket: None,
            n_reduce: 0,
        }
    }

    /// true para WAIT / SHUTDOWN
    pub fn is_signal(&self) -> bool {
        matches!(self.kind, TaskKind::Wait | TaskKind::Shutdown)
    }

    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Done
    }
}
