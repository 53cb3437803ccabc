use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use common::{
    JobDoneResponse, JobInfo, JobResults, TaskAssignmentRequest, TaskAssignmentResponse,
    TaskCompleteRequest, TaskCompleteResponse, TaskKind,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/tasks/next", post(request_task))
        .route("/api/v1/tasks/complete", post(complete_task))
        .route("/api/v1/job", get(get_job))
        .route("/api/v1/job/done", get(job_done))
        .route("/api/v1/job/results", get(get_job_results))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/* ---------------- handlers HTTP ---------------- */

async fn health() -> &'static str {
    "ok"
}

// RequestTask: el worker pide la siguiente tarea
async fn request_task(
    State(state): State<AppState>,
    Json(req): Json<TaskAssignmentRequest>,
) -> Json<TaskAssignmentResponse> {
    let assignment = state.registry.request_task();

    if assignment.task.kind == TaskKind::Wait {
        debug!("worker {} pidió tarea pero no hay libres, WAIT", req.worker_id);
    } else if assignment.task.kind != TaskKind::Shutdown {
        debug!("tarea {} -> worker {}", assignment.task.id, req.worker_id);
    }

    Json(assignment)
}

// ReportTaskDone: el worker reporta que terminó una tarea
async fn complete_task(
    State(state): State<AppState>,
    Json(req): Json<TaskCompleteRequest>,
) -> Json<TaskCompleteResponse> {
    let ok = state.registry.report_task_done(&req);
    Json(TaskCompleteResponse { ok })
}

// IsDone: lo consulta el driver del job, no los workers
async fn job_done(State(state): State<AppState>) -> Json<JobDoneResponse> {
    let done = state.registry.is_done().await;
    Json(JobDoneResponse { done })
}

async fn get_job(State(state): State<AppState>) -> Json<JobInfo> {
    Json(state.registry.snapshot())
}

async fn get_job_results(State(state): State<AppState>) -> Json<JobResults> {
    Json(JobResults {
        work_dir: state.work_dir.to_string_lossy().to_string(),
        outputs: state.registry.outputs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::registry;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use common::{JobPhase, ProducedFile, Task};
    use serde::de::DeserializeOwned;
    use std::path::PathBuf;
    use tower::ServiceExt;

    fn app(files: &[&str], n_reduce: u32) -> (Router, AppState) {
        let state = AppState {
            registry: registry(files, n_reduce),
            work_dir: PathBuf::from("/tmp/mr"),
        };
        (build_router(state.clone()), state)
    }

    async fn call<T: DeserializeOwned>(
        router: &Router,
        method: Method,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> T {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(match body {
                Some(v) => Body::from(v.to_string()),
                None => Body::empty(),
            })
            .unwrap();

        let resp = router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_responde_ok() {
        let (router, _) = app(&["a"], 1);
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let resp = router.oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"ok");
    }

    #[tokio::test]
    async fn ciclo_pedir_y_reportar_por_http() {
        let (router, state) = app(&["x.txt"], 1);

        let a: TaskAssignmentResponse = call(
            &router,
            Method::POST,
            "/api/v1/tasks/next",
            Some(serde_json::json!({ "worker_id": "w1" })),
        )
        .await;
        assert_eq!(a.task, {
            let mut t = Task::map(0, "x.txt", 1);
            t.status = common::TaskStatus::InProgress;
            t
        });

        let report = TaskCompleteRequest {
            worker_id: "w1".to_string(),
            task: a.task,
            produced_files: vec![ProducedFile {
                name: "0-0".to_string(),
                bucket: 0,
            }],
        };
        let done: TaskCompleteResponse = call(
            &router,
            Method::POST,
            "/api/v1/tasks/complete",
            Some(serde_json::to_value(&report).unwrap()),
        )
        .await;
        assert!(done.ok);

        let r: TaskAssignmentResponse = call(
            &router,
            Method::POST,
            "/api/v1/tasks/next",
            Some(serde_json::json!({ "worker_id": "w2" })),
        )
        .await;
        assert_eq!(r.task.kind, TaskKind::Reduce);
        assert_eq!(r.intermediate_files, vec!["0-0"]);

        assert_eq!(state.registry.request_count(), 3);
    }

    #[tokio::test]
    async fn reporte_de_tarea_desconocida_devuelve_ok_false() {
        let (router, _) = app(&["x.txt"], 1);

        let report = TaskCompleteRequest {
            worker_id: "w1".to_string(),
            task: Task::map(77, "zz", 1),
            produced_files: vec![],
        };
        let resp: TaskCompleteResponse = call(
            &router,
            Method::POST,
            "/api/v1/tasks/complete",
            Some(serde_json::to_value(&report).unwrap()),
        )
        .await;

        assert!(!resp.ok);
    }

    #[tokio::test]
    async fn consultas_de_estado_no_cuentan_como_trafico() {
        let (router, state) = app(&["x.txt", "y.txt"], 2);

        let info: JobInfo = call(&router, Method::GET, "/api/v1/job", None).await;
        assert_eq!(info.phase, JobPhase::Map);
        assert_eq!(info.total_tasks, 4);

        let done: JobDoneResponse = call(&router, Method::GET, "/api/v1/job/done", None).await;
        assert!(!done.done);

        let results: JobResults = call(&router, Method::GET, "/api/v1/job/results", None).await;
        assert_eq!(results.outputs, vec![None, None]);
        assert_eq!(results.work_dir, "/tmp/mr");

        assert_eq!(state.registry.request_count(), 0);
    }
}
