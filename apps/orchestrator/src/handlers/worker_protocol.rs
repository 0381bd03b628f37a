use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use gradecore_db::QueueRepository;
use gradecore_models::{Job, OperationKind, WorkerCapability, WorkerHeartbeat};
use serde::{Deserialize, Serialize};

use crate::errors::OrchestratorError;
use crate::services::dispatcher;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AcquireRequest {
    shard: u32,
    kinds: Vec<OperationKind>,
}

#[derive(Debug, Serialize)]
pub struct JobAssignment {
    job_id: String,
    job: Job,
}

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    job_id: String,
    job: Job,
}

pub async fn register(
    State(state): State<AppState>,
    Json(capability): Json<WorkerCapability>,
) -> impl IntoResponse {
    state.register_worker(capability);
    StatusCode::NO_CONTENT
}

pub async fn heartbeat(
    State(state): State<AppState>,
    Json(heartbeat): Json<WorkerHeartbeat>,
) -> impl IntoResponse {
    state.record_heartbeat(heartbeat.shard);
    StatusCode::NO_CONTENT
}

/// Reserves one job for the caller's shard (§4.5 step 1, §6 worker
/// protocol). `204 No Content` when nothing matching is queued.
pub async fn acquire(
    State(state): State<AppState>,
    Json(request): Json<AcquireRequest>,
) -> Result<impl IntoResponse, OrchestratorError> {
    state.is_operational()?;

    let kinds: Vec<String> = request.kinds.iter().map(|k| k.as_job_kind().to_string()).collect();
    let conn = state.db.connection()?;
    let claimed = QueueRepository::new(conn)
        .claim_next(&request.shard.to_string(), &kinds)
        .await?;

    let Some(claimed) = claimed else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    let job: Job = serde_json::from_str(&claimed.payload_json)
        .map_err(|e| OrchestratorError::BadRequest(e.to_string()))?;

    Ok(Json(JobAssignment { job_id: claimed.id, job }).into_response())
}

/// Applies a worker's report for a finished job (§4.5 step 4).
pub async fn report(
    State(state): State<AppState>,
    Json(request): Json<ReportRequest>,
) -> Result<impl IntoResponse, OrchestratorError> {
    dispatcher::handle_job_report(&state, &request.job_id, request.job).await?;
    Ok(StatusCode::NO_CONTENT)
}
