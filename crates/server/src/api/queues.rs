//! Queue overview.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use debridarr_core::queues::{Queue, QueuedItem};

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct QueueItemView {
    pub id: i64,
    pub title: String,
    pub version: Option<String>,
    /// State shown to users; an upgrade being checked reads as Upgrading
    pub state: &'static str,
    pub entered_at: DateTime<Utc>,
}

impl From<QueuedItem> for QueueItemView {
    fn from(queued: QueuedItem) -> Self {
        Self {
            id: queued.item.id,
            state: queued.item.effective_state().as_str(),
            title: queued.item.title,
            version: queued.item.version,
            entered_at: queued.entered_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QueueView {
    pub name: &'static str,
    pub count: usize,
    /// Database-backed queues report counts only.
    pub in_memory: bool,
    pub items: Vec<QueueItemView>,
}

#[derive(Debug, Serialize)]
pub struct QueuesResponse {
    pub queues: Vec<QueueView>,
    pub total: usize,
}

pub async fn list_queues(State(state): State<Arc<AppState>>) -> Json<QueuesResponse> {
    let mut queues = Vec::new();
    for queue in state.manager().queues() {
        let in_memory = !queue.state().is_db_backed();
        let items = if in_memory {
            queue
                .get_contents()
                .await
                .into_iter()
                .map(QueueItemView::from)
                .collect()
        } else {
            Vec::new()
        };
        queues.push(QueueView {
            name: queue.name(),
            count: queue.len().await,
            in_memory,
            items,
        });
    }

    let total = queues.iter().map(|q| q.count).sum();
    Json(QueuesResponse { queues, total })
}
