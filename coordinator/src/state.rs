// coordinator/src/state.rs

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use common::{
    JobInfo, JobPhase, Task, TaskAssignmentResponse, TaskCompleteRequest, TaskId, TaskInfo,
    TaskKind, TaskStatus,
};
use std::{
    collections::{BTreeMap, BTreeSet},
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tracing::{debug, info, warn};

use crate::lease;
use crate::{LEASE_TIMEOUT, STABILITY_WINDOW};

/// Estado compartido por los handlers HTTP.
#[derive(Clone)]
pub struct AppState {
    pub registry: Registry,
    // donde workers escriben intermedios y salidas
    pub work_dir: PathBuf,
}

/// Tiempos del coordinador (configurables para tests).
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    /// Ventana del lease de cada asignación
    pub lease: Duration,
    /// Ventana en la que el contador de requests debe quedarse quieto
    pub stability_window: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            lease: LEASE_TIMEOUT,
            stability_window: STABILITY_WINDOW,
        }
    }
}

/// Entrada del registro: la tarea más su contabilidad de leases.
#[derive(Debug, Clone)]
pub(crate) struct Slot {
    pub task: Task,
    /// Se incrementa en cada asignación; un timer con epoch viejo no hace nada
    pub epoch: u64,
    pub assigned_at: Option<DateTime<Utc>>,
    pub assignments: u32,
}

#[derive(Debug)]
pub(crate) struct JobState {
    pub slots: Vec<Slot>,
    pub n_map: u32,
    pub n_reduce: u32,
    // todos los archivos reportados, en orden de llegada
    pub produced_files: Vec<String>,
    // bucket -> intermedios de ese bucket (fuente de verdad para los reduce)
    pub intermediate: BTreeMap<u32, BTreeSet<String>>,
    // bucket -> archivo de salida final
    pub outputs: BTreeMap<u32, String>,
    pub request_count: u64,
    pub started_at: DateTime<Utc>,
}

impl JobState {
    pub fn all_done(&self) -> bool {
        self.slots.iter().all(|s| s.task.is_done())
    }

    pub fn all_maps_done(&self) -> bool {
        self.map_slots().iter().all(|s| s.task.is_done())
    }

    pub fn phase(&self) -> JobPhase {
        if self.all_done() {
            JobPhase::Finished
        } else if self.all_maps_done() {
            JobPhase::Reduce
        } else {
            JobPhase::Map
        }
    }

    fn map_slots(&self) -> &[Slot] {
        &self.slots[..self.n_map as usize]
    }

    fn count(&self, status: TaskStatus) -> u32 {
        self.slots.iter().filter(|s| s.task.status == status).count() as u32
    }

    /// Primer PENDING de la fase activa: lo marca IN_PROGRESS y abre un epoch nuevo.
    fn claim_pending(&mut self, range: std::ops::Range<usize>) -> Option<(usize, u64)> {
        let idx = range
            .into_iter()
            .find(|&i| self.slots[i].task.status == TaskStatus::Pending)?;

        let slot = &mut self.slots[idx];
        slot.task.status = TaskStatus::InProgress;
        slot.epoch += 1;
        slot.assignments += 1;
        slot.assigned_at = Some(Utc::now());

        Some((idx, slot.epoch))
    }

    fn intermediate_for(&self, bucket: u32) -> Vec<String> {
        self.intermediate
            .get(&bucket)
            .map(|files| files.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// Registro de tareas del job. Dueño exclusivo del estado; toda lectura y
/// escritura pasa por un único lock.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<Mutex<JobState>>,
    timing: Timing,
}

impl Registry {
    /// Crea una tarea MAP por archivo (ids 0..M) y una REDUCE por bucket
    /// (ids M..M+n_reduce), todas PENDING.
    pub fn new(input_files: Vec<String>, n_reduce: u32, timing: Timing) -> Result<Self> {
        if n_reduce == 0 {
            bail!("n_reduce debe ser al menos 1");
        }

        let n_map = input_files.len() as u32;
        let mut slots = Vec::with_capacity(input_files.len() + n_reduce as usize);

        for (id, file) in input_files.into_iter().enumerate() {
            slots.push(Slot::new(Task::map(id as TaskId, file, n_reduce)));
        }
        for bucket in 0..n_reduce {
            slots.push(Slot::new(Task::reduce(n_map + bucket, bucket, n_reduce)));
        }

        info!(
            "registro creado: {} tareas map, {} tareas reduce",
            n_map, n_reduce
        );

        Ok(Self {
            inner: Arc::new(Mutex::new(JobState {
                slots,
                n_map,
                n_reduce,
                produced_files: Vec::new(),
                intermediate: BTreeMap::new(),
                outputs: BTreeMap::new(),
                request_count: 0,
                started_at: Utc::now(),
            })),
            timing,
        })
    }

    /// Cada mutación es un store de un campo, así que un lock envenenado
    /// sigue dejando el estado consistente.
    pub(crate) fn lock(&self) -> MutexGuard<'_, JobState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    /// RequestTask: SHUTDOWN si todo terminó; si no, el primer PENDING de la
    /// fase activa (map hasta que todos los map estén DONE, luego reduce);
    /// WAIT si la fase activa no tiene trabajo libre.
    ///
    /// Arma el lease con `tokio::spawn`: hay que llamarla dentro de un runtime.
    pub fn request_task(&self) -> TaskAssignmentResponse {
        let (task, intermediate_files, epoch) = {
            let mut st = self.lock();
            st.request_count += 1;

            if st.all_done() {
                return TaskAssignmentResponse {
                    task: Task::shutdown(),
                    intermediate_files: Vec::new(),
                };
            }

            let n_map = st.n_map as usize;
            let range = if st.all_maps_done() {
                n_map..st.slots.len()
            } else {
                0..n_map
            };

            let Some((idx, epoch)) = st.claim_pending(range) else {
                return TaskAssignmentResponse {
                    task: Task::wait(),
                    intermediate_files: Vec::new(),
                };
            };

            let task = st.slots[idx].task.clone();
            let files = match task.reduce_bucket {
                Some(bucket) if task.kind == TaskKind::Reduce => st.intermediate_for(bucket),
                _ => Vec::new(),
            };
            (task, files, epoch)
        };

        info!(
            "asignando tarea {} ({:?}, input={:?}, bucket={:?}, epoch={}, intermedios={})",
            task.id,
            task.kind,
            task.input_file,
            task.reduce_bucket,
            epoch,
            intermediate_files.len()
        );

        lease::arm(self.clone(), task.id, epoch, self.timing.lease);

        TaskAssignmentResponse {
            task,
            intermediate_files,
        }
    }

    /// ReportTaskDone: registra los archivos producidos y marca DONE la tarea
    /// con ese id. Reportes repetidos o tardíos se aceptan (último gana).
    /// Devuelve false si el reporte se ignoró.
    pub fn report_task_done(&self, req: &TaskCompleteRequest) -> bool {
        let mut st = self.lock();
        st.request_count += 1;

        if req.task.is_signal() {
            debug!("reporte de señal {:?} ignorado", req.task.kind);
            return false;
        }

        let id = req.task.id;
        let Some(idx) = st
            .slots
            .iter()
            .position(|s| s.task.id == id && s.task.kind == req.task.kind)
        else {
            warn!(
                "reporte de {} para tarea desconocida {} ({:?}), ignorado",
                req.worker_id, id, req.task.kind
            );
            return false;
        };

        let kind = st.slots[idx].task.kind;
        let own_bucket = st.slots[idx].task.reduce_bucket;
        let n_reduce = st.n_reduce;

        for f in &req.produced_files {
            st.produced_files.push(f.name.clone());

            match (kind, own_bucket) {
                // la salida de un reduce va siempre a su propio bucket
                (TaskKind::Reduce, Some(bucket)) => {
                    if f.bucket != bucket {
                        warn!(
                            "reduce {} reportó {} con bucket {}, se registra en su bucket {}",
                            id, f.name, f.bucket, bucket
                        );
                    }
                    st.outputs.insert(bucket, f.name.clone());
                }
                (TaskKind::Map, _) if f.bucket < n_reduce => {
                    st.intermediate
                        .entry(f.bucket)
                        .or_default()
                        .insert(f.name.clone());
                }
                _ => {
                    warn!(
                        "archivo {} de la tarea {} con bucket {} fuera de rango",
                        f.name, id, f.bucket
                    );
                }
            }
        }

        let slot = &mut st.slots[idx];
        if slot.task.is_done() {
            debug!("tarea {} reportada de nuevo por {}", id, req.worker_id);
        }
        slot.task.status = TaskStatus::Done;

        info!(
            "tarea {} ({:?}) completada por {} ({} archivos)",
            id,
            kind,
            req.worker_id,
            req.produced_files.len()
        );
        true
    }

    pub fn all_done(&self) -> bool {
        self.lock().all_done()
    }

    pub fn request_count(&self) -> u64 {
        self.lock().request_count
    }

    pub fn task(&self, id: TaskId) -> Option<Task> {
        self.lock()
            .slots
            .iter()
            .find(|s| s.task.id == id)
            .map(|s| s.task.clone())
    }

    /// Archivo de salida por bucket, en orden de bucket.
    pub fn outputs(&self) -> Vec<Option<String>> {
        let st = self.lock();
        (0..st.n_reduce)
            .map(|b| st.outputs.get(&b).cloned())
            .collect()
    }

    /// Snapshot de sólo lectura; no cuenta como request.
    pub fn snapshot(&self) -> JobInfo {
        let st = self.lock();
        JobInfo {
            phase: st.phase(),
            n_map: st.n_map,
            n_reduce: st.n_reduce,
            started_at: st.started_at,
            total_tasks: st.slots.len() as u32,
            pending_tasks: st.count(TaskStatus::Pending),
            in_progress_tasks: st.count(TaskStatus::InProgress),
            completed_tasks: st.count(TaskStatus::Done),
            request_count: st.request_count,
            produced_files: st.produced_files.clone(),
            tasks: st
                .slots
                .iter()
                .map(|s| TaskInfo {
                    task: s.task.clone(),
                    assigned_at: s.assigned_at,
                    assignments: s.assignments,
                })
                .collect(),
        }
    }
}

impl Slot {
    fn new(task: Task) -> Self {
        Self {
            task,
            epoch: 0,
            assigned_at: None,
            assignments: 0,
        }
    }
}
