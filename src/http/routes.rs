use super::handlers;
use super::state::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session control
        .route("/session/start", post(handlers::start_session))
        .route("/session/stop", post(handlers::stop_session))
        .route("/session/clear", post(handlers::clear_session))
        // Session queries
        .route("/session/status", get(handlers::get_status))
        .route("/session/transcript", get(handlers::get_transcript))
        .route("/session/report", get(handlers::get_report))
        .route("/session/analyze", post(handlers::analyze_session))
        // Content mappings
        .route(
            "/mappings",
            get(handlers::export_mappings).post(handlers::add_mapping),
        )
        .route("/mappings/import", post(handlers::import_mappings))
        .route("/mappings/:mapping_id", delete(handlers::delete_mapping))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
