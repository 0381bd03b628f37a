use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::handlers::{admin, health, ingress, worker_protocol};
use crate::middleware::worker_auth_guard;
use crate::state::AppState;

pub fn build(state: AppState) -> Router {
    let worker_routes = Router::new()
        .route("/register", post(worker_protocol::register))
        .route("/heartbeat", post(worker_protocol::heartbeat))
        .route("/jobs/acquire", post(worker_protocol::acquire))
        .route("/jobs/report", post(worker_protocol::report))
        .route_layer(middleware::from_fn_with_state(state.clone(), worker_auth_guard));

    let admin_routes = Router::new()
        .route("/reevaluate", post(admin::reevaluate))
        .route("/rescore", post(admin::rescore))
        .route("/invalidate", post(admin::invalidate))
        .route("/cancel", post(admin::cancel));

    Router::new()
        .route("/health", get(health::health))
        .route("/api/v1/submissions/:submission_id/submit", post(ingress::submit))
        .nest("/api/v1/admin", admin_routes)
        .nest("/api/v1/workers", worker_routes)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
