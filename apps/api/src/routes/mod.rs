pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::profiling::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        // Sessions
        .route("/api/v1/sessions", post(handlers::handle_create_session))
        .route(
            "/api/v1/sessions/:id",
            get(handlers::handle_get_session).delete(handlers::handle_delete_session),
        )
        // Profiling
        .route(
            "/api/v1/sessions/:id/resume",
            post(handlers::handle_profile_resume),
        )
        .route("/api/v1/sessions/:id/job", post(handlers::handle_profile_job))
        .route(
            "/api/v1/sessions/:id/headers",
            post(handlers::handle_profile_headers),
        )
        // Matching
        .route("/api/v1/sessions/:id/match", post(handlers::handle_match))
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
}
