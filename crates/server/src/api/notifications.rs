//! Stored notification history.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use debridarr_core::notifications::{Notification, NotificationFilter};

use super::handlers::{error_response, ErrorResponse, MessageResponse};
use crate::state::AppState;

/// Maximum allowed limit for notification queries
const MAX_LIMIT: i64 = 500;

/// Default limit for notification queries
const DEFAULT_LIMIT: i64 = 100;

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Debug, Deserialize)]
pub struct NotificationQueryParams {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct NotificationListResponse {
    pub notifications: Vec<Notification>,
    /// Unread notifications overall, regardless of paging
    pub unread: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct ReadAllResponse {
    pub updated: usize,
}

pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NotificationQueryParams>,
) -> Result<Json<NotificationListResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = NotificationFilter::new()
        .with_limit(limit)
        .with_offset(offset);
    if params.unread_only {
        filter = filter.unread_only();
    }

    let store = state.notification_store();
    let notifications = store.list(&filter).map_err(|e| {
        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to list notifications: {}", e),
        )
    })?;
    let unread = store.count_unread().map_err(|e| {
        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to count notifications: {}", e),
        )
    })?;

    Ok(Json(NotificationListResponse {
        notifications,
        unread,
        limit,
        offset,
    }))
}

pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    match state.notification_store().mark_read(id) {
        Ok(true) => Ok(Json(MessageResponse {
            message: format!("Notification {} marked read", id),
        })),
        Ok(false) => Err(error_response(
            StatusCode::NOT_FOUND,
            format!("Notification {} not found", id),
        )),
        Err(e) => Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to update notification: {}", e),
        )),
    }
}

pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReadAllResponse>, ApiError> {
    state
        .notification_store()
        .mark_all_read()
        .map(|updated| Json(ReadAllResponse { updated }))
        .map_err(|e| {
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to update notifications: {}", e),
            )
        })
}
