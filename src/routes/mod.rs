pub mod health;
pub mod metrics;
pub mod profiles;

use axum::routing::{get, post};
use axum::Router;

use crate::app_state::AppState;

/// API surface shared by the server binary and the route tests. Transport
/// layers and the metrics endpoint are attached by the binary.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/profiles", post(profiles::create_profiles))
        .route("/api/v1/profiles", get(profiles::list_profiles))
        .route("/api/v1/profiles/{job_id}", get(profiles::get_profile))
        .with_state(state)
}
