use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::errors::OrchestratorError;
use crate::services::dispatcher::{self, AdminScope, InvalidateLevel};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReevaluateRequest {
    pub submission_id: Option<i64>,
    pub dataset_id: Option<i64>,
    pub task_id: Option<i64>,
}

impl ReevaluateRequest {
    fn scope(&self) -> Result<AdminScope, OrchestratorError> {
        match (self.submission_id, self.dataset_id, self.task_id) {
            (Some(id), None, None) => Ok(AdminScope::Submission(id)),
            (None, Some(id), None) => Ok(AdminScope::Dataset(id)),
            (None, None, Some(id)) => Ok(AdminScope::Task(id)),
            _ => Err(OrchestratorError::BadRequest(
                "exactly one of submission_id, dataset_id, task_id must be set".into(),
            )),
        }
    }
}

/// `reevaluate(submission_id | dataset_id | task_id)` (§6).
pub async fn reevaluate(
    State(state): State<AppState>,
    Json(request): Json<ReevaluateRequest>,
) -> Result<impl IntoResponse, OrchestratorError> {
    dispatcher::reevaluate(&state, request.scope()?).await?;
    Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, Deserialize)]
pub struct RescoreRequest {
    pub dataset_id: i64,
}

/// `rescore(dataset_id)`: reruns scoring only, reusing stored
/// Evaluations (§6).
pub async fn rescore(
    State(state): State<AppState>,
    Json(request): Json<RescoreRequest>,
) -> Result<impl IntoResponse, OrchestratorError> {
    dispatcher::rescore(&state, request.dataset_id).await?;
    Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidateLevelWire {
    Compile,
    Evaluate,
    Score,
}

impl From<InvalidateLevelWire> for InvalidateLevel {
    fn from(level: InvalidateLevelWire) -> Self {
        match level {
            InvalidateLevelWire::Compile => InvalidateLevel::Compile,
            InvalidateLevelWire::Evaluate => InvalidateLevel::Evaluate,
            InvalidateLevelWire::Score => InvalidateLevel::Score,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct InvalidateRequest {
    pub submission_id: Option<i64>,
    pub dataset_id: Option<i64>,
    pub task_id: Option<i64>,
    pub level: InvalidateLevelWire,
}

/// `invalidate(target, level)`: drops results at and above `level` and
/// re-enqueues (§6).
pub async fn invalidate(
    State(state): State<AppState>,
    Json(request): Json<InvalidateRequest>,
) -> Result<impl IntoResponse, OrchestratorError> {
    let scope = ReevaluateRequest {
        submission_id: request.submission_id,
        dataset_id: request.dataset_id,
        task_id: request.task_id,
    }
    .scope()?;
    dispatcher::invalidate(&state, scope, request.level.into()).await?;
    Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub submission_id: i64,
}

/// `cancel(submission_id)`: marks pending jobs cancelled (§6).
pub async fn cancel(
    State(state): State<AppState>,
    Json(request): Json<CancelRequest>,
) -> Result<impl IntoResponse, OrchestratorError> {
    dispatcher::cancel(&state, request.submission_id).await?;
    Ok(StatusCode::ACCEPTED)
}
