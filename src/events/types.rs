use std::fmt;
use std::net::{IpAddr, SocketAddr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geoip::GeoInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Connection,
    AuthAttempt,
    Command,
    SessionEnd,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Connection => "connection",
            EventKind::AuthAttempt => "auth_attempt",
            EventKind::Command => "command",
            EventKind::SessionEnd => "session_end",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "connection" => Some(EventKind::Connection),
            "auth_attempt" => Some(EventKind::AuthAttempt),
            "command" => Some(EventKind::Command),
            "session_end" => Some(EventKind::SessionEnd),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific part of an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    Connection {
        #[serde(default)]
        session_id: Option<String>,
        banner: String,
        #[serde(default)]
        client_banner: Option<String>,
        #[serde(default)]
        request: Option<String>,
        #[serde(default)]
        geo: Option<GeoInfo>,
    },
    AuthAttempt {
        session_id: String,
        user: String,
        pass: String,
        attempt_number: u32,
    },
    Command {
        session_id: String,
        user: String,
        command: String,
    },
    SessionEnd {
        session_id: String,
        user: String,
        duration_seconds: f64,
    },
}

/// One immutable record of attacker activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub src_ip: IpAddr,
    pub src_port: u16,
    pub protocol: String,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(peer: SocketAddr, protocol: &str, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            src_ip: peer.ip(),
            src_port: peer.port(),
            protocol: protocol.to_string(),
            payload,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self.payload {
            EventPayload::Connection { .. } => EventKind::Connection,
            EventPayload::AuthAttempt { .. } => EventKind::AuthAttempt,
            EventPayload::Command { .. } => EventKind::Command,
            EventPayload::SessionEnd { .. } => EventKind::SessionEnd,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::Connection { session_id, .. } => session_id.as_deref(),
            EventPayload::AuthAttempt { session_id, .. }
            | EventPayload::Command { session_id, .. }
            | EventPayload::SessionEnd { session_id, .. } => Some(session_id),
        }
    }
}
