use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::state::AppState;

/// Create the HTTP router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Recording control
        .route("/meetings/record/start", post(handlers::start_recording))
        .route(
            "/meetings/record/stop/:session_key",
            post(handlers::stop_recording),
        )
        .route(
            "/meetings/record/pause/:session_key",
            post(handlers::pause_recording),
        )
        .route(
            "/meetings/record/resume/:session_key",
            post(handlers::resume_recording),
        )
        // Live session queries
        .route(
            "/sessions/:session_key/status",
            get(handlers::session_status),
        )
        .route(
            "/sessions/:session_key/transcript",
            get(handlers::session_transcript),
        )
        // Meeting records
        .route("/meetings", get(handlers::list_meetings))
        .route(
            "/meetings/:meeting_id",
            get(handlers::get_meeting),
        )
        .route("/meetings/:meeting_id", patch(handlers::patch_meeting))
        .route("/meetings/:meeting_id", delete(handlers::delete_meeting))
        // Analysis & follow-up
        .route(
            "/meetings/:meeting_id/analyze",
            post(handlers::analyze_meeting),
        )
        .route(
            "/meetings/:meeting_id/follow-up",
            post(handlers::follow_up_email),
        )
        // Request logging + permissive CORS for the browser client
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
