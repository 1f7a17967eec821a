//! HTTP API server for external control (side panel / desktop shell)
//!
//! This module provides a REST API for driving the coaching session:
//! - POST /session/start - Start recording
//! - POST /session/stop - Stop recording
//! - POST /session/clear - Reset accumulated session data
//! - GET /session/status - Query session statistics
//! - GET /session/transcript - Get the accumulated transcript
//! - GET /session/report - Render the session report
//! - POST /session/analyze - Hand the transcript to the analysis collaborator
//! - GET /mappings - Export the content mapping pack
//! - POST /mappings - Add a content mapping
//! - POST /mappings/import - Import a content pack (replace or merge)
//! - DELETE /mappings/:mapping_id - Remove a content mapping
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
