use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::state::AppState;
use crate::meeting::{
    run_analysis, AnalysisError, EmailContext, EmailError, MeetingPatch, PersistenceError, Tone,
};
use crate::session::{
    SessionConfig, SessionController, SessionError, SessionStats, StopSummary,
};
use crate::transcript::TranscriptFragment;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartRecordingRequest {
    pub title: Option<String>,
    /// Milliseconds between audio chunks (default 5000).
    pub chunk_interval_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct StartRecordingResponse {
    pub session_key: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct StopRecordingResponse {
    pub status: String,
    #[serde(flatten)]
    pub summary: StopSummary,
}

#[derive(Debug, Deserialize)]
pub struct FollowUpRequest {
    #[serde(default)]
    pub tone: Tone,
}

#[derive(Debug, Serialize)]
pub struct FollowUpResponse {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn err(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Verified user identifier, supplied by the identity layer in front of
/// this service as an `x-user-id` header.
pub struct UserId(pub String);

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for UserId {
    type Rejection = axum::response::Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(|v| UserId(v.to_string()))
            .ok_or_else(|| err(StatusCode::UNAUTHORIZED, "Missing x-user-id header"))
    }
}

fn persistence_error(e: PersistenceError) -> axum::response::Response {
    match e {
        PersistenceError::NotFound => err(StatusCode::NOT_FOUND, "Meeting not found"),
        PersistenceError::Unavailable(msg) => err(StatusCode::SERVICE_UNAVAILABLE, msg),
    }
}

// ============================================================================
// Recording control
// ============================================================================

/// POST /meetings/record/start
pub async fn start_recording(
    State(state): State<AppState>,
    user: UserId,
    Json(req): Json<StartRecordingRequest>,
) -> impl IntoResponse {
    let config = SessionConfig {
        user_id: user.0,
        title: req
            .title
            .unwrap_or_else(|| state.session_defaults.title.clone()),
        chunk_interval: req
            .chunk_interval_ms
            .map(Duration::from_millis)
            .unwrap_or(state.session_defaults.chunk_interval),
        ..state.session_defaults.clone()
    };

    let session = Arc::new(SessionController::new(
        config,
        (state.device_factory)(),
        Arc::clone(&state.store),
        Arc::clone(&state.analyzer),
        state.transcriber_factory.clone(),
    ));

    if let Err(e) = session.start().await {
        error!("Failed to start recording: {}", e);
        return match e {
            SessionError::Recorder(e) => err(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
            other => err(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        };
    }

    let session_key = session.session_key().to_string();
    state
        .sessions
        .write()
        .await
        .insert(session_key.clone(), session);

    info!("Recording started (session {})", session_key);

    (
        StatusCode::OK,
        Json(StartRecordingResponse {
            session_key,
            status: "recording".to_string(),
        }),
    )
        .into_response()
}

/// POST /meetings/record/stop/:session_key
pub async fn stop_recording(
    State(state): State<AppState>,
    Path(session_key): Path<String>,
) -> impl IntoResponse {
    let session = state.sessions.write().await.remove(&session_key);

    let Some(session) = session else {
        return err(StatusCode::NOT_FOUND, "Session not found");
    };

    match session.stop().await {
        Ok(summary) => (
            StatusCode::OK,
            Json(StopRecordingResponse {
                status: "stopped".to_string(),
                summary,
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to stop recording: {}", e);
            err(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn with_session(
    state: &AppState,
    session_key: &str,
) -> Result<Arc<SessionController>, axum::response::Response> {
    state
        .sessions
        .read()
        .await
        .get(session_key)
        .cloned()
        .ok_or_else(|| err(StatusCode::NOT_FOUND, "Session not found"))
}

/// POST /meetings/record/pause/:session_key
pub async fn pause_recording(
    State(state): State<AppState>,
    Path(session_key): Path<String>,
) -> impl IntoResponse {
    match with_session(&state, &session_key).await {
        Ok(session) => match session.pause().await {
            Ok(()) => StatusCode::OK.into_response(),
            Err(e) => err(StatusCode::CONFLICT, e.to_string()),
        },
        Err(resp) => resp,
    }
}

/// POST /meetings/record/resume/:session_key
pub async fn resume_recording(
    State(state): State<AppState>,
    Path(session_key): Path<String>,
) -> impl IntoResponse {
    match with_session(&state, &session_key).await {
        Ok(session) => match session.resume().await {
            Ok(()) => StatusCode::OK.into_response(),
            Err(e) => err(StatusCode::CONFLICT, e.to_string()),
        },
        Err(resp) => resp,
    }
}

/// GET /sessions/:session_key/status
pub async fn session_status(
    State(state): State<AppState>,
    Path(session_key): Path<String>,
) -> impl IntoResponse {
    match with_session(&state, &session_key).await {
        Ok(session) => {
            let stats: SessionStats = session.stats().await;
            (StatusCode::OK, Json(stats)).into_response()
        }
        Err(resp) => resp,
    }
}

/// GET /sessions/:session_key/transcript
pub async fn session_transcript(
    State(state): State<AppState>,
    Path(session_key): Path<String>,
) -> impl IntoResponse {
    match with_session(&state, &session_key).await {
        Ok(session) => {
            let fragments: Vec<TranscriptFragment> = session.transcript().await;
            (StatusCode::OK, Json(fragments)).into_response()
        }
        Err(resp) => resp,
    }
}

// ============================================================================
// Meeting records
// ============================================================================

/// GET /meetings
pub async fn list_meetings(State(state): State<AppState>, user: UserId) -> impl IntoResponse {
    match state.store.list(&user.0).await {
        Ok(meetings) => (StatusCode::OK, Json(meetings)).into_response(),
        Err(e) => persistence_error(e),
    }
}

/// GET /meetings/:meeting_id
pub async fn get_meeting(
    State(state): State<AppState>,
    user: UserId,
    Path(meeting_id): Path<String>,
) -> impl IntoResponse {
    match state.store.get(&user.0, &meeting_id).await {
        Ok(meeting) => (StatusCode::OK, Json(meeting)).into_response(),
        Err(e) => persistence_error(e),
    }
}

/// PATCH /meetings/:meeting_id
pub async fn patch_meeting(
    State(state): State<AppState>,
    user: UserId,
    Path(meeting_id): Path<String>,
    Json(patch): Json<MeetingPatch>,
) -> impl IntoResponse {
    match state.store.update(&user.0, &meeting_id, patch).await {
        Ok(meeting) => (StatusCode::OK, Json(meeting)).into_response(),
        Err(e) => persistence_error(e),
    }
}

/// DELETE /meetings/:meeting_id
pub async fn delete_meeting(
    State(state): State<AppState>,
    user: UserId,
    Path(meeting_id): Path<String>,
) -> impl IntoResponse {
    match state.store.delete(&user.0, &meeting_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => persistence_error(e),
    }
}

// ============================================================================
// Analysis & follow-up
// ============================================================================

/// POST /meetings/:meeting_id/analyze
///
/// Explicit re-analyze for meetings left in PROCESSING by an earlier
/// analysis failure.
pub async fn analyze_meeting(
    State(state): State<AppState>,
    user: UserId,
    Path(meeting_id): Path<String>,
) -> impl IntoResponse {
    let meeting = match state.store.get(&user.0, &meeting_id).await {
        Ok(m) => m,
        Err(e) => return persistence_error(e),
    };

    let Some(transcript) = meeting.transcript else {
        return err(StatusCode::BAD_REQUEST, "Meeting has no transcript");
    };

    match run_analysis(
        Arc::clone(&state.store),
        Arc::clone(&state.analyzer),
        &user.0,
        &meeting_id,
        &transcript,
    )
    .await
    {
        Ok(_) => match state.store.get(&user.0, &meeting_id).await {
            Ok(meeting) => (StatusCode::OK, Json(meeting)).into_response(),
            Err(e) => persistence_error(e),
        },
        Err(AnalysisError::TranscriptTooShort(n)) => err(
            StatusCode::BAD_REQUEST,
            format!("Transcript too short for analysis ({} chars)", n),
        ),
        Err(e) => {
            error!("Analysis failed for meeting {}: {}", meeting_id, e);
            err(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

/// POST /meetings/:meeting_id/follow-up
pub async fn follow_up_email(
    State(state): State<AppState>,
    user: UserId,
    Path(meeting_id): Path<String>,
    Json(req): Json<FollowUpRequest>,
) -> impl IntoResponse {
    let meeting = match state.store.get(&user.0, &meeting_id).await {
        Ok(m) => m,
        Err(e) => return persistence_error(e),
    };

    let context = match EmailContext::from_record(&meeting) {
        Ok(c) => c,
        Err(EmailError::NoSummary) => {
            return err(
                StatusCode::CONFLICT,
                "Meeting has no summary yet; run analysis first",
            )
        }
        Err(e) => return err(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    let email = match state.email.generate(&context, req.tone).await {
        Ok(body) => body,
        Err(e) => {
            error!("Email generation failed for meeting {}: {}", meeting_id, e);
            return err(StatusCode::BAD_GATEWAY, e.to_string());
        }
    };

    let patch = MeetingPatch {
        follow_up_email: Some(email.clone()),
        ..Default::default()
    };
    if let Err(e) = state.store.update(&user.0, &meeting_id, patch).await {
        return persistence_error(e);
    }

    (StatusCode::OK, Json(FollowUpResponse { email })).into_response()
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
