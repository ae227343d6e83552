use std::collections::BTreeMap;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::types::{Event, EventKind, EventPayload};

/// Selection applied by [`Storage::list_events`](super::storage_trait::Storage::list_events).
///
/// Every set field must match. `limit` keeps the most recent events while
/// preserving chronological order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventFilter {
    pub kind: Option<EventKind>,
    pub src_ip: Option<IpAddr>,
    pub session_id: Option<String>,
    pub limit: Option<usize>,
}

impl EventFilter {
    pub fn for_session(session_id: &str) -> Self {
        Self {
            session_id: Some(session_id.to_string()),
            ..Default::default()
        }
    }

    pub fn matches(&self, event: &Event) -> bool {
        if let Some(kind) = self.kind {
            if event.kind() != kind {
                return false;
            }
        }
        if let Some(ip) = self.src_ip {
            if event.src_ip != ip {
                return false;
            }
        }
        if let Some(ref id) = self.session_id {
            if event.session_id() != Some(id.as_str()) {
                return false;
            }
        }
        true
    }

    /// Filters events already in chronological order.
    pub fn apply(&self, events: Vec<Event>) -> Vec<Event> {
        let mut selected: Vec<Event> = events.into_iter().filter(|e| self.matches(e)).collect();
        if let Some(limit) = self.limit {
            let excess = selected.len().saturating_sub(limit);
            selected.drain(..excess);
        }
        selected
    }
}

/// Per-session aggregate served by the reporting interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub src_ip: IpAddr,
    pub protocol: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub user: Option<String>,
    pub authenticated: bool,
    pub auth_attempts: u32,
    pub commands: u32,
    pub duration_seconds: Option<f64>,
}

impl SessionSummary {
    fn open(session_id: &str, event: &Event) -> Self {
        Self {
            session_id: session_id.to_string(),
            src_ip: event.src_ip,
            protocol: event.protocol.clone(),
            started_at: event.timestamp,
            ended_at: None,
            user: None,
            authenticated: false,
            auth_attempts: 0,
            commands: 0,
            duration_seconds: None,
        }
    }

    fn absorb(&mut self, event: &Event) {
        if event.timestamp < self.started_at {
            self.started_at = event.timestamp;
        }
        match &event.payload {
            EventPayload::Connection { .. } => {}
            EventPayload::AuthAttempt { user, .. } => {
                self.auth_attempts += 1;
                if !self.authenticated {
                    self.user = Some(user.clone());
                }
            }
            EventPayload::Command { user, .. } => {
                self.commands += 1;
                self.authenticated = true;
                self.user = Some(user.clone());
            }
            EventPayload::SessionEnd {
                user,
                duration_seconds,
                ..
            } => {
                self.authenticated = true;
                self.user = Some(user.clone());
                self.ended_at = Some(event.timestamp);
                self.duration_seconds = Some(*duration_seconds);
            }
        }
    }
}

/// Groups events by session id, ordered by session start.
///
/// A session counts as authenticated once it has a command or an end record;
/// rejected sessions never produce either.
pub fn summarize(events: &[Event]) -> Vec<SessionSummary> {
    let mut sessions: BTreeMap<String, SessionSummary> = BTreeMap::new();
    for event in events {
        let Some(id) = event.session_id() else {
            continue;
        };
        sessions
            .entry(id.to_string())
            .or_insert_with(|| SessionSummary::open(id, event))
            .absorb(event);
    }
    let mut summaries: Vec<SessionSummary> = sessions.into_values().collect();
    summaries.sort_by(|a, b| a.started_at.cmp(&b.started_at));
    summaries
}


#[cfg(test)]
mod tests {
    use super::fixtures::sample_events;
    use super::*;

    #[test]
    fn test_filter_fields() {
        let events = sample_events();
        let commands = EventFilter {
            kind: Some(EventKind::Command),
            ..Default::default()
        }
        .apply(events.clone());
        assert_eq!(commands.len(), 1);

        let from_ip = EventFilter {
            src_ip: Some("198.51.100.20".parse().unwrap()),
            ..Default::default()
        }
        .apply(events.clone());
        assert_eq!(from_ip.len(), 1);

        let session = EventFilter::for_session("203.0.113.7_1700000000").apply(events.clone());
        assert_eq!(session.len(), 4);
    }

    #[test]
    fn test_limit_keeps_latest() {
        let events = sample_events();
        let last_two = EventFilter {
            limit: Some(2),
            ..Default::default()
        }
        .apply(events.clone());
        assert_eq!(last_two, events[4..].to_vec());
    }

    #[test]
    fn test_summaries() {
        let summaries = summarize(&sample_events());
        assert_eq!(summaries.len(), 2);

        let accepted = summaries
            .iter()
            .find(|s| s.session_id == "203.0.113.7_1700000000")
            .unwrap();
        assert!(accepted.authenticated);
        assert_eq!(accepted.auth_attempts, 1);
        assert_eq!(accepted.commands, 1);
        assert_eq!(accepted.user.as_deref(), Some("root"));
        assert_eq!(accepted.duration_seconds, Some(4.5));

        let rejected = summaries
            .iter()
            .find(|s| s.session_id == "198.51.100.20_1700000100")
            .unwrap();
        assert!(!rejected.authenticated);
        assert_eq!(rejected.ended_at, None);
        assert_eq!(rejected.user.as_deref(), Some("admin"));
    }
}
