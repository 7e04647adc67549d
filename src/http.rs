//! HTTP surface for submitting and polling jobs.

use std::future::Future;
use std::io;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::Value;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::error::JobError;
use crate::orchestrator::{JobOrchestrator, SubmitReceipt};
use crate::state_machine::{Job, JobInput, JobState};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<JobOrchestrator>,
}

/// Build the Axum router with the job routes.
pub fn job_routes(orchestrator: Arc<JobOrchestrator>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/status", get(health))
        .route("/echo", post(echo))
        .route("/jobs", post(submit_job).get(list_jobs))
        .route("/jobs/{id}", get(get_job).delete(cancel_job))
        .route("/jobs/{id}/result", get(get_result))
        .with_state(AppState { orchestrator })
}

/// Serve the job routes until `shutdown` resolves, then stop admitting
/// queued jobs.
pub async fn serve<S>(
    listener: TcpListener,
    orchestrator: Arc<JobOrchestrator>,
    shutdown: S,
) -> io::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "PAPI listening");
    }
    axum::serve(listener, job_routes(Arc::clone(&orchestrator)))
        .with_graceful_shutdown(shutdown)
        .await?;
    orchestrator.shutdown();
    Ok(())
}

// ── Health ──────────────────────────────────────────────────────────────

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({ "message": "PAPI backend online 🚀" }))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn echo(Json(payload): Json<Value>) -> impl IntoResponse {
    Json(serde_json::json!({ "received": payload }))
}

// ── Jobs ────────────────────────────────────────────────────────────────

async fn submit_job(
    State(state): State<AppState>,
    payload: Result<Json<JobInput>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitReceipt>), JobError> {
    let Json(input) = payload.map_err(|rejection| JobError::InvalidInput(rejection.body_text()))?;
    let receipt = state.orchestrator.submit(input).await?;
    Ok((StatusCode::ACCEPTED, Json(receipt)))
}

async fn list_jobs(State(state): State<AppState>) -> Json<Vec<Job>> {
    Json(state.orchestrator.list().await)
}

async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Job>, JobError> {
    Ok(Json(state.orchestrator.status(&id).await?))
}

async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Job>, JobError> {
    Ok(Json(state.orchestrator.cancel(&id).await?))
}

async fn get_result(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, JobError> {
    let file = state.orchestrator.fetch_result(&id).await?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        file.artifact.filename.replace(['"', '\\'], "")
    );
    Ok((
        [
            (header::CONTENT_TYPE, file.artifact.content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(futures::stream::try_unfold(file.file, read_chunk)),
    )
        .into_response())
}

const CHUNK_SIZE: usize = 64 * 1024;

async fn read_chunk(mut file: File) -> io::Result<Option<(Vec<u8>, File)>> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let n = file.read(&mut buf).await?;
    if n == 0 {
        return Ok(None);
    }
    buf.truncate(n);
    Ok(Some((buf, file)))
}

// ── Errors ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<JobState>,
}

impl IntoResponse for JobError {
    fn into_response(self) -> Response {
        let (status, state) = match &self {
            JobError::NotFound(_) => (StatusCode::NOT_FOUND, None),
            JobError::NotReady { state, .. } => (StatusCode::CONFLICT, Some(*state)),
            JobError::Gone { .. } => (StatusCode::GONE, None),
            JobError::InvalidInput(_) => (StatusCode::BAD_REQUEST, None),
            JobError::InvalidTransition { from, .. } => (StatusCode::CONFLICT, Some(*from)),
        };
        if status == StatusCode::GONE {
            warn!(error = %self, "Artifact lookup failed");
        }

        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
            state,
        };
        (status, Json(body)).into_response()
    }
}
