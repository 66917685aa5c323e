//! Item and torrent tracking lookups.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use debridarr_core::debrid::extract_hash;
use debridarr_core::tracking::TorrentAddition;
use debridarr_core::{ItemState, MediaItem};

use super::handlers::{error_response, ErrorResponse};
use crate::state::AppState;

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Debug, Serialize)]
pub struct ItemResponse {
    #[serde(flatten)]
    pub item: MediaItem,
    pub effective_state: ItemState,
}

#[derive(Debug, Serialize)]
pub struct TrackingResponse {
    pub hash: String,
    /// Newest first
    pub history: Vec<TorrentAddition>,
}

pub async fn get_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ItemResponse>, ApiError> {
    match state.manager().media().get(id) {
        Ok(Some(item)) => Ok(Json(ItemResponse {
            effective_state: item.effective_state(),
            item,
        })),
        Ok(None) => Err(error_response(
            StatusCode::NOT_FOUND,
            format!("Item {} not found", id),
        )),
        Err(e) => Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to load item: {}", e),
        )),
    }
}

pub async fn get_tracking(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Result<Json<TrackingResponse>, ApiError> {
    let Some(hash) = extract_hash(&raw) else {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("Not an info hash: {}", raw),
        ));
    };

    let history = state.manager().tracking().get_history(&hash).map_err(|e| {
        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to load tracking history: {}", e),
        )
    })?;
    if history.is_empty() {
        return Err(error_response(
            StatusCode::NOT_FOUND,
            format!("No tracking history for {}", hash),
        ));
    }

    Ok(Json(TrackingResponse { hash, history }))
}
