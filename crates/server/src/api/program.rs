//! Program runner status and pause control.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use debridarr_core::{PauseKind, RunnerStatus};

use super::handlers::{error_response, ErrorResponse, MessageResponse};
use crate::state::AppState;

const DEFAULT_PAUSE_REASON: &str = "Paused via API";
const DEFAULT_RESUME_REASON: &str = "Resumed via API";

/// Program status response
#[derive(Debug, Serialize)]
pub struct ProgramStatusResponse {
    /// Whether queues are processed on the next pass
    pub processing: bool,
    #[serde(flatten)]
    pub status: RunnerStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct PauseRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

fn reason_or(reason: Option<String>, default: &str) -> String {
    reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| default.to_string())
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<ProgramStatusResponse> {
    let status = state.runner().status();
    Json(ProgramStatusResponse {
        processing: status.is_processing(),
        status,
    })
}

/// Manually pause queue processing
pub async fn pause(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PauseRequest>,
) -> Result<Json<MessageResponse>, (StatusCode, Json<ErrorResponse>)> {
    let reason = reason_or(request.reason, DEFAULT_PAUSE_REASON);
    if !state
        .runner()
        .pause_controller()
        .pause(PauseKind::Manual, &reason)
        .await
    {
        return Err(error_response(
            StatusCode::CONFLICT,
            "Queue processing is already paused",
        ));
    }

    info!(reason = %reason, "Program paused via API");
    Ok(Json(MessageResponse {
        message: format!("Queue processing paused: {}", reason),
    }))
}

/// Resume after a manual or connectivity pause
pub async fn resume(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MessageResponse>, (StatusCode, Json<ErrorResponse>)> {
    if !state
        .runner()
        .pause_controller()
        .resume(DEFAULT_RESUME_REASON)
        .await
    {
        return Err(error_response(
            StatusCode::CONFLICT,
            "Queue processing is not paused",
        ));
    }

    info!("Program resumed via API");
    Ok(Json(MessageResponse {
        message: "Queue processing resumed".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_reason_falls_back_to_default() {
        assert_eq!(reason_or(None, DEFAULT_PAUSE_REASON), "Paused via API");
        assert_eq!(
            reason_or(Some("   ".to_string()), DEFAULT_PAUSE_REASON),
            "Paused via API"
        );
        assert_eq!(
            reason_or(Some(" maintenance ".to_string()), DEFAULT_PAUSE_REASON),
            "maintenance"
        );
    }
}
