//! Session management core module.
//!
//! This module drives one SSH-like connection from the banner to the end of
//! the fake shell: client hello, credential prompts, the interactive shell
//! and the events emitted along the way.

use serde::{Deserialize, Serialize};

/// Submodule holding the weak-credential table.
pub mod credentials;
/// Submodule for session data structures and utilities.
pub mod session;
/// Submodule for the connection state machine.
pub mod session_handler;
/// Submodule for byte-level terminal input.
pub mod terminal;


/// Where a session currently is in its lifecycle.
///
/// Variants:
/// - `Connected`: banner sent, waiting for the client hello.
/// - `Authenticating`: prompting for credentials.
/// - `Shell`: authenticated, running the fake shell.
/// - `Rejected`: too many failed logins, closed without a shell.
/// - `Closed`: ended by logout, timeout, EOF or a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Connected,
    Authenticating,
    Shell,
    Rejected,
    Closed,
}
