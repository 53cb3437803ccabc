use std::time::Duration;

use common::{TaskId, TaskStatus};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::state::Registry;

/// Arma el lease de una asignación: pasado `after`, si la tarea sigue
/// IN_PROGRESS con el mismo epoch vuelve a PENDING para reasignarse.
///
/// No hay cancelación: cuando la tarea termina o se reasigna, el timer viejo
/// simplemente no encuentra su epoch y no hace nada.
///
/// # Panics
/// Fuera de un runtime de tokio: una asignación sin lease no se recupera nunca.
pub fn arm(registry: Registry, task_id: TaskId, epoch: u64, after: Duration) {
    tokio::spawn(async move {
        sleep(after).await;
        registry.expire_lease(task_id, epoch);
    });
}

impl Registry {
    /// Vence el lease `(task_id, epoch)`. Devuelve true si la tarea volvió a PENDING.
    pub(crate) fn expire_lease(&self, task_id: TaskId, epoch: u64) -> bool {
        let mut st = self.lock();

        let Some(slot) = st.slots.iter_mut().find(|s| s.task.id == task_id) else {
            return false;
        };

        if slot.task.status != TaskStatus::InProgress || slot.epoch != epoch {
            debug!(
                "lease vencido de la tarea {} (epoch {}) sin efecto: status={:?}, epoch actual={}",
                task_id, epoch, slot.task.status, slot.epoch
            );
            return false;
        }

        slot.task.status = TaskStatus::Pending;
        warn!(
            "lease vencido: tarea {} ({:?}) vuelve a PENDING tras {} asignaciones",
            task_id, slot.task.kind, slot.assignments
        );
        true
    }
}
