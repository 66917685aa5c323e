//! Audit log queries.
//!
//! `GET /api/v1/audit` filters by item, torrent hash, event kind and queue
//! transition. `from_state`/`to_state` use the stored state names, so a
//! query like `?from_state=Checking&to_state=Pending%20Uncached` lists every
//! item parked as uncached.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use debridarr_core::audit::{AuditKind, AuditQuery, AuditRecord, Page};
use debridarr_core::debrid::extract_hash;
use debridarr_core::ItemState;

use super::handlers::{error_response, ErrorResponse};
use crate::state::AppState;

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Debug, Default, Deserialize)]
pub struct AuditParams {
    pub item_id: Option<i64>,
    /// Info hash or magnet link
    pub hash: Option<String>,
    /// Comma-separated event kinds, e.g. `torrent_added,torrent_removed`
    pub kind: Option<String>,
    pub from_state: Option<String>,
    pub to_state: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct AuditResponse {
    pub events: Vec<AuditRecord>,
    /// Matches across all pages
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

fn parse_state(field: &str, raw: &str) -> Result<ItemState, String> {
    ItemState::parse(raw).ok_or_else(|| format!("Unknown {}: {}", field, raw))
}

fn parse_kinds(raw: &str) -> Result<Vec<AuditKind>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| AuditKind::parse(s).ok_or_else(|| format!("Unknown event kind: {}", s)))
        .collect()
}

impl AuditParams {
    fn into_query(self) -> Result<(AuditQuery, Page), String> {
        if let (Some(since), Some(until)) = (self.since, self.until) {
            if since > until {
                return Err("'since' must not be after 'until'".to_string());
            }
        }

        let hash = match self.hash.as_deref() {
            Some(raw) => {
                Some(extract_hash(raw).ok_or_else(|| format!("Not an info hash: {}", raw))?)
            }
            None => None,
        };
        let kinds = match self.kind.as_deref() {
            Some(raw) => parse_kinds(raw)?,
            None => Vec::new(),
        };
        let from_state = self
            .from_state
            .as_deref()
            .map(|raw| parse_state("from_state", raw))
            .transpose()?;
        let to_state = self
            .to_state
            .as_deref()
            .map(|raw| parse_state("to_state", raw))
            .transpose()?;

        let query = AuditQuery {
            item_id: self.item_id,
            hash,
            kinds,
            from_state,
            to_state,
            since: self.since,
            until: self.until,
        };
        let page = Page::new(
            self.limit.unwrap_or(Page::DEFAULT_LIMIT),
            self.offset.unwrap_or(0),
        );
        Ok((query, page))
    }
}

pub async fn query_audit(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuditParams>,
) -> Result<Json<AuditResponse>, ApiError> {
    let (query, page) = params
        .into_query()
        .map_err(|message| error_response(StatusCode::BAD_REQUEST, message))?;

    let found = state.audit_store().query(&query, page).map_err(|e| {
        error!(error = %e, "Audit query failed");
        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to query audit events: {}", e),
        )
    })?;

    Ok(Json(AuditResponse {
        events: found.records,
        total: found.total,
        limit: page.limit,
        offset: page.offset,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> AuditParams {
        AuditParams::default()
    }

    #[test]
    fn test_empty_params_match_everything() {
        let (query, page) = params().into_query().unwrap();
        assert_eq!(query, AuditQuery::default());
        assert_eq!(page, Page::default());
    }

    #[test]
    fn test_parses_transition_with_stored_names() {
        let (query, _) = AuditParams {
            from_state: Some("Checking".to_string()),
            to_state: Some("Pending Uncached".to_string()),
            ..params()
        }
        .into_query()
        .unwrap();
        assert_eq!(query.from_state, Some(ItemState::Checking));
        assert_eq!(query.to_state, Some(ItemState::PendingUncached));

        let bad = AuditParams {
            to_state: Some("PendingUncached".to_string()),
            ..params()
        };
        assert_eq!(
            bad.into_query().unwrap_err(),
            "Unknown to_state: PendingUncached"
        );
    }

    #[test]
    fn test_parses_kind_list() {
        let (query, _) = AuditParams {
            kind: Some("torrent_added, torrent_removed".to_string()),
            ..params()
        }
        .into_query()
        .unwrap();
        assert_eq!(
            query.kinds,
            vec![AuditKind::TorrentAdded, AuditKind::TorrentRemoved]
        );

        let bad = AuditParams {
            kind: Some("torrent_added,bogus".to_string()),
            ..params()
        };
        assert!(bad.into_query().is_err());
    }

    #[test]
    fn test_hash_accepts_magnet_and_rejects_garbage() {
        let magnet = "magnet:?xt=urn:btih:A94A8FE5CCB19BA61C4C0873D391E987982FBBD3&dn=x";
        let (query, _) = AuditParams {
            hash: Some(magnet.to_string()),
            ..params()
        }
        .into_query()
        .unwrap();
        assert_eq!(
            query.hash.as_deref(),
            Some("a94a8fe5ccb19ba61c4c0873d391e987982fbbd3")
        );

        let bad = AuditParams {
            hash: Some("not-a-hash".to_string()),
            ..params()
        };
        assert!(bad.into_query().is_err());
    }

    #[test]
    fn test_rejects_inverted_time_range_and_clamps_limit() {
        let now = Utc::now();
        let inverted = AuditParams {
            since: Some(now),
            until: Some(now - chrono::Duration::hours(1)),
            ..params()
        };
        assert!(inverted.into_query().is_err());

        let (_, page) = AuditParams {
            limit: Some(50_000),
            offset: Some(20),
            ..params()
        }
        .into_query()
        .unwrap();
        assert_eq!(page, Page::new(Page::MAX_LIMIT, 20));
    }
}
