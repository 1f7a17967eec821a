use super::state::AppState;
use crate::coaching::{ContentMapping, ImportMode, MappingPack, TipKind};
use crate::session::SessionStats;
use crate::transcript::TranscriptSegment;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StopSessionResponse {
    pub session_id: String,
    pub status: String,
    pub stats: SessionStats,
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub transcript: String,
    pub segments: Vec<TranscriptSegment>,
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    /// Optional report title
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub report: String,
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub analysis: String,
}

#[derive(Debug, Deserialize)]
pub struct AddMappingRequest {
    #[serde(rename = "type")]
    pub kind: TipKind,
    pub keywords: Vec<String>,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct AddMappingResponse {
    pub mapping: ContentMapping,
}

#[derive(Debug, Deserialize)]
pub struct ImportMappingsRequest {
    pub mode: ImportMode,
    pub pack: MappingPack,
}

#[derive(Debug, Serialize)]
pub struct ImportMappingsResponse {
    pub imported: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /session/start
/// Start recording
pub async fn start_session(State(state): State<AppState>) -> impl IntoResponse {
    let session = &state.session;

    if session.is_recording() {
        return (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: format!("Session {} is already recording", session.session_id()),
            }),
        )
            .into_response();
    }

    info!("Starting session via HTTP: {}", session.session_id());

    if let Err(e) = session.start().await {
        error!("Failed to start recording: {:#}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Failed to start recording: {e:#}"),
            }),
        )
            .into_response();
    }

    (
        StatusCode::OK,
        Json(SessionResponse {
            session_id: session.session_id().to_string(),
            status: "recording".to_string(),
            message: "Recording started".to_string(),
        }),
    )
        .into_response()
}

/// POST /session/stop
/// Stop recording
pub async fn stop_session(State(state): State<AppState>) -> impl IntoResponse {
    let session = &state.session;

    if !session.is_recording() {
        return (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "Not recording".to_string(),
            }),
        )
            .into_response();
    }

    info!("Stopping session via HTTP: {}", session.session_id());

    match session.stop().await {
        Ok(stats) => (
            StatusCode::OK,
            Json(StopSessionResponse {
                session_id: session.session_id().to_string(),
                status: "stopped".to_string(),
                stats,
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to stop recording: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to stop recording: {e:#}"),
                }),
            )
                .into_response()
        }
    }
}

/// POST /session/clear
/// Reset accumulated session data
pub async fn clear_session(State(state): State<AppState>) -> impl IntoResponse {
    match state.session.clear().await {
        Ok(()) => (
            StatusCode::OK,
            Json(SessionResponse {
                session_id: state.session.session_id().to_string(),
                status: "cleared".to_string(),
                message: "Session data cleared".to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to clear session: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to clear session: {e:#}"),
                }),
            )
                .into_response()
        }
    }
}

/// GET /session/status
/// Get session statistics
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.session.stats().await;
    (StatusCode::OK, Json(stats)).into_response()
}

/// GET /session/transcript
/// Get the accumulated transcript and its segments
pub async fn get_transcript(State(state): State<AppState>) -> impl IntoResponse {
    let transcript = state.session.transcript().await;
    let segments = state.session.segments().await;
    (
        StatusCode::OK,
        Json(TranscriptResponse {
            transcript,
            segments,
        }),
    )
        .into_response()
}

/// GET /session/report
/// Render the session report; 204 when there is no transcript
pub async fn get_report(
    State(state): State<AppState>,
    axum::extract::Query(query): axum::extract::Query<ReportQuery>,
) -> impl IntoResponse {
    let name = query
        .name
        .unwrap_or_else(|| format!("Session {}", state.session.session_id()));
    match state.session.session_report(&name).await {
        Some(report) => (StatusCode::OK, Json(ReportResponse { report })).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// POST /session/analyze
/// Hand the transcript to the analysis collaborator; 204 when empty
pub async fn analyze_session(State(state): State<AppState>) -> impl IntoResponse {
    match state.session.analyze().await {
        Ok(Some(analysis)) => (StatusCode::OK, Json(AnalysisResponse { analysis })).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            error!("Analysis failed: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Analysis failed: {e:#}"),
                }),
            )
                .into_response()
        }
    }
}

/// GET /mappings
/// Export the content mapping pack
pub async fn export_mappings(State(state): State<AppState>) -> impl IntoResponse {
    let pack = state.session.export_mappings().await;
    (StatusCode::OK, Json(pack)).into_response()
}

/// POST /mappings
/// Add a content mapping
pub async fn add_mapping(
    State(state): State<AppState>,
    Json(req): Json<AddMappingRequest>,
) -> impl IntoResponse {
    let keywords: Vec<String> = req
        .keywords
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();

    if keywords.is_empty() || req.content.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Both keywords and coaching content are required".to_string(),
            }),
        )
            .into_response();
    }

    let mapping = ContentMapping {
        id: uuid::Uuid::new_v4().to_string(),
        kind: req.kind,
        keywords,
        content: req.content.trim().to_string(),
    };
    state.session.add_mapping(mapping.clone()).await;

    (StatusCode::OK, Json(AddMappingResponse { mapping })).into_response()
}

/// POST /mappings/import
/// Import a content pack with replace or merge semantics
pub async fn import_mappings(
    State(state): State<AppState>,
    Json(req): Json<ImportMappingsRequest>,
) -> impl IntoResponse {
    match state.session.import_mappings(req.pack, req.mode).await {
        Ok(imported) => (StatusCode::OK, Json(ImportMappingsResponse { imported })).into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("Import failed: {e:#}"),
            }),
        )
            .into_response(),
    }
}

/// DELETE /mappings/:mapping_id
/// Remove a content mapping
pub async fn delete_mapping(
    State(state): State<AppState>,
    Path(mapping_id): Path<String>,
) -> impl IntoResponse {
    if state.session.remove_mapping(&mapping_id).await {
        StatusCode::OK.into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Mapping {mapping_id} not found"),
            }),
        )
            .into_response()
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
