use chrono::{DateTime, Utc};
use std::net::{IpAddr, SocketAddr};

use crate::session_management::SessionStatus;

/// Bookkeeping for one SSH-like connection.
#[derive(Debug, Clone)]
pub struct Session {
    /// `<ip>_<unix seconds>`, shared by every event of the connection
    pub id: String,
    pub peer: SocketAddr,
    /// Last username offered, then the authenticated one
    pub user: String,
    pub auth_attempts: u32,
    pub status: SessionStatus,
}

impl Session {
    pub fn new(peer: SocketAddr) -> Self {
        Self {
            id: session_id(peer.ip(), Utc::now()),
            peer,
            user: String::new(),
            auth_attempts: 0,
            status: SessionStatus::Connected,
        }
    }
}

/// Session identifier derived from the peer address and the connect time.
///
/// Two connections from the same address within one second share an id.
pub fn session_id(ip: IpAddr, at: DateTime<Utc>) -> String {
    format!("{}_{}", ip, at.timestamp())
}
