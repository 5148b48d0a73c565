//! Audit trail endpoint.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use gatekeeper_model::{AccessEvent, AccessEventFilter, CredentialKind, Decision};
use gatekeeper_store::StoreSession;
use serde::Deserialize;

use crate::error::{AdminError, AdminResult};
use crate::AdminState;

/// Query parameters for `GET /api/admin/events`.
#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    /// `granted` or `denied`
    pub result: Option<Decision>,
    /// `RFID` or `PIN`
    pub credential_type: Option<CredentialKind>,
    /// RFC 3339 lower bound, inclusive
    pub from: Option<String>,
    /// RFC 3339 upper bound, inclusive
    pub to: Option<String>,
    /// Page size, 100 by default and at most 500
    pub limit: Option<u32>,
}

impl EventsQuery {
    /// Build the store filter.
    pub fn to_filter(&self) -> AdminResult<AccessEventFilter> {
        let mut filter = AccessEventFilter::new()
            .between(parse_instant(self.from.as_deref())?, parse_instant(self.to.as_deref())?)
            .with_limit(self.limit.unwrap_or(0));
        filter.decision = self.result;
        filter.credential_kind = self.credential_type;
        Ok(filter)
    }
}

fn parse_instant(raw: Option<&str>) -> AdminResult<Option<DateTime<Utc>>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| AdminError::bad_request("bad_timestamp", format!("{}: {}", s, e))),
    }
}

/// List audit events, newest first.
pub async fn list_events(
    State(state): State<AdminState>,
    Query(query): Query<EventsQuery>,
) -> AdminResult<Json<Vec<AccessEvent>>> {
    let filter = query.to_filter()?;
    let mut session = state.store.checkout().await?;
    let events = session.list_access_events(&filter).await?;
    Ok(Json(events))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_to_filter() {
        let query = EventsQuery {
            result: Some(Decision::Denied),
            credential_type: Some(CredentialKind::Pin),
            from: Some("2026-01-01T00:00:00Z".to_string()),
            to: Some(" ".to_string()),
            limit: Some(9_999),
        };
        let filter = query.to_filter().unwrap();

        assert_eq!(filter.decision, Some(Decision::Denied));
        assert_eq!(filter.credential_kind, Some(CredentialKind::Pin));
        assert!(filter.from.is_some());
        assert!(filter.to.is_none());
        assert_eq!(filter.effective_limit(), AccessEventFilter::MAX_LIMIT);
        assert_eq!(
            EventsQuery::default().to_filter().unwrap().effective_limit(),
            AccessEventFilter::DEFAULT_LIMIT
        );
    }

    #[test]
    fn test_bad_timestamp() {
        let query = EventsQuery {
            from: Some("yesterday".to_string()),
            ..EventsQuery::default()
        };
        let err = query.to_filter().unwrap_err();
        assert_eq!(err.code(), "bad_timestamp");
    }
}
