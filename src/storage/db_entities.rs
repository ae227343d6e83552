//! SeaORM entity model used by the database storage backend.
//!
//! Maps the single `events` table created by `database_storage`. Columns that
//! the reporting filters query on are stored flat; the kind-specific payload
//! is kept as JSON.

use sea_orm::entity::prelude::*;

/// Events table entity model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "events")]
pub struct Model {
    /// Auto-increment row id, which is also the recording order
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Event UUID as string
    pub event_id: String,
    /// RFC3339 timestamp
    pub ts: String,
    /// `connection`, `auth_attempt`, `command` or `session_end`
    pub kind: String,
    pub src_ip: String,
    pub src_port: i32,
    /// `ssh` or `http`
    pub protocol: String,
    /// Absent for connections that never became a session
    pub session_id: Option<String>,
    /// JSON-serialized `EventPayload`
    pub payload: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
