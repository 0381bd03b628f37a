use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::{AppState, SystemMode};

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let mode = match state.mode() {
        SystemMode::Operational => "operational",
        SystemMode::Maintenance(_) => "maintenance",
    };
    Json(json!({ "status": mode, "workers": state.registered_workers().len() }))
}
