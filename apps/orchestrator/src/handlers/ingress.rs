use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::errors::OrchestratorError;
use crate::services::dispatcher;
use crate::state::AppState;

/// `submit(submission_id)` (§6 "Ingress"): fire-and-forget, returns once
/// the first job is durably enqueued. The submission row itself is
/// assumed to already exist — created by the contestant web surface,
/// which is out of scope here.
pub async fn submit(
    State(state): State<AppState>,
    Path(submission_id): Path<i64>,
) -> Result<impl IntoResponse, OrchestratorError> {
    state.is_operational()?;
    dispatcher::enqueue_operations_for_submission(&state, submission_id).await?;
    Ok(StatusCode::ACCEPTED)
}
