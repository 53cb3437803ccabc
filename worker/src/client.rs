use anyhow::{bail, Context, Result};
use common::{
    ProducedFile, Task, TaskAssignmentRequest, TaskAssignmentResponse, TaskCompleteRequest,
    TaskCompleteResponse, WorkerId,
};
use reqwest::Client;
use tracing::{info, warn};

/// Cliente HTTP del coordinador para un worker.
#[derive(Clone)]
pub struct CoordinatorClient {
    http: Client,
    base_url: String,
    worker_id: WorkerId,
}

impl CoordinatorClient {
    pub fn new(base_url: impl Into<String>, worker_id: impl Into<WorkerId>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            worker_id: worker_id.into(),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// RequestTask. `Ok(None)` si no se pudo hablar con el coordinador: lo
    /// normal cuando ya terminó el job y se apagó.
    pub async fn request_task(&self) -> Result<Option<TaskAssignmentResponse>> {
        let url = format!("{}/api/v1/tasks/next", self.base_url);
        let res = self
            .http
            .post(&url)
            .json(&TaskAssignmentRequest {
                worker_id: self.worker_id.clone(),
            })
            .send()
            .await;

        let resp = match res {
            Ok(resp) => resp,
            Err(e) => {
                info!("no se pudo contactar al coordinador en {}: {}", url, e);
                return Ok(None);
            }
        };

        if !resp.status().is_success() {
            bail!("coordinador devolvió status {} al pedir tarea", resp.status());
        }

        let assignment: TaskAssignmentResponse = resp
            .json()
            .await
            .context("respuesta de asignación inválida")?;
        Ok(Some(assignment))
    }

    /// ReportTaskDone. Acá un fallo de transporte sí es un error: el trabajo
    /// hecho se pierde y no hay forma de avanzar sin el coordinador.
    pub async fn report_task_done(&self, task: &Task, produced_files: Vec<ProducedFile>) -> Result<()> {
        let url = format!("{}/api/v1/tasks/complete", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&TaskCompleteRequest {
                worker_id: self.worker_id.clone(),
                task: task.clone(),
                produced_files,
            })
            .send()
            .await
            .with_context(|| format!("no se pudo reportar la tarea {} a {}", task.id, url))?;

        if !resp.status().is_success() {
            bail!(
                "coordinador devolvió status {} al reportar la tarea {}",
                resp.status(),
                task.id
            );
        }

        let ack: TaskCompleteResponse = resp.json().await?;
        if !ack.ok {
            warn!("el coordinador ignoró el reporte de la tarea {}", task.id);
        }
        Ok(())
    }
}
