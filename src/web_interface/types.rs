use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::events::types::EventKind;
use crate::storage::types::EventFilter;

/// Largest page `/api/events` will return.
pub const MAX_EVENTS: usize = 1000;
pub const DEFAULT_EVENTS: usize = 200;

/// API error payload
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub message: String,
}

/// Query string of `GET /api/events`.
#[derive(Debug, Default, Deserialize)]
pub struct EventQuery {
    pub kind: Option<String>,
    pub src_ip: Option<String>,
    pub session_id: Option<String>,
    pub limit: Option<usize>,
}

impl EventQuery {
    /// Validates the query into a storage filter. Errors are user-facing.
    pub fn to_filter(&self) -> Result<EventFilter, String> {
        let kind = match self.kind.as_deref().filter(|k| !k.is_empty()) {
            Some(name) => {
                Some(EventKind::parse(name).ok_or_else(|| format!("unknown event kind '{}'", name))?)
            }
            None => None,
        };
        let src_ip: Option<IpAddr> = match self.src_ip.as_deref().filter(|ip| !ip.is_empty()) {
            Some(ip) => Some(
                ip.parse()
                    .map_err(|_| format!("invalid source address '{}'", ip))?,
            ),
            None => None,
        };
        Ok(EventFilter {
            kind,
            src_ip,
            session_id: self.session_id.clone().filter(|id| !id.is_empty()),
            limit: Some(self.limit.unwrap_or(DEFAULT_EVENTS).min(MAX_EVENTS)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_to_filter() {
        let query = EventQuery {
            kind: Some("auth_attempt".into()),
            src_ip: Some("203.0.113.7".into()),
            session_id: Some(String::new()),
            limit: Some(5000),
        };
        let filter = query.to_filter().unwrap();
        assert_eq!(filter.kind, Some(EventKind::AuthAttempt));
        assert_eq!(filter.src_ip, Some("203.0.113.7".parse().unwrap()));
        assert_eq!(filter.session_id, None);
        assert_eq!(filter.limit, Some(MAX_EVENTS));

        assert_eq!(
            EventQuery::default().to_filter().unwrap().limit,
            Some(DEFAULT_EVENTS)
        );
    }

    #[test]
    fn test_query_rejects_bad_values() {
        let bad_kind = EventQuery {
            kind: Some("login".into()),
            ..Default::default()
        };
        assert_eq!(bad_kind.to_filter().unwrap_err(), "unknown event kind 'login'");

        let bad_ip = EventQuery {
            src_ip: Some("999.1.1.1".into()),
            ..Default::default()
        };
        assert!(bad_ip.to_filter().is_err());
    }
}
