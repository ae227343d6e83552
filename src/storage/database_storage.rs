use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error, info};
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{
    ColumnTrait, ConnectionTrait, Database, DatabaseConnection, DbBackend, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Statement,
};
use uuid::Uuid;

use crate::error_handling::types::StorageError;
use crate::events::types::{Event, EventPayload};
use crate::storage::db_entities::{self as events, Column};
use crate::storage::storage_trait::Storage;
use crate::storage::types::EventFilter;

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        event_id TEXT NOT NULL UNIQUE,
        ts TEXT NOT NULL,
        kind TEXT NOT NULL,
        src_ip TEXT NOT NULL,
        src_port INTEGER NOT NULL,
        protocol TEXT NOT NULL,
        session_id TEXT,
        payload TEXT NOT NULL
    );",
    "CREATE INDEX IF NOT EXISTS idx_events_session ON events(session_id);",
    "CREATE INDEX IF NOT EXISTS idx_events_src_ip ON events(src_ip);",
];

/// SQLite event store through SeaORM.
pub struct DatabaseStorage {
    db: DatabaseConnection,
}

impl DatabaseStorage {
    pub const DB_FILE: &'static str = "events.db";

    /// Opens or creates `<dir>/events.db` and ensures the schema exists.
    pub async fn open<P: AsRef<Path>>(dir: P) -> Result<Self, StorageError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| {
            error!("Failed to create storage dir {}: {}", dir.display(), e);
            StorageError::ConnectionFailed
        })?;
        let url = format!("sqlite://{}?mode=rwc", dir.join(Self::DB_FILE).display());
        let db = Database::connect(&url).await.map_err(|e| {
            error!("Failed to open {}: {}", url, e);
            StorageError::ConnectionFailed
        })?;
        for statement in SCHEMA {
            db.execute(Statement::from_string(DbBackend::Sqlite, statement))
                .await
                .map_err(|e| {
                    error!("Failed to create schema: {}", e);
                    StorageError::ConnectionFailed
                })?;
        }
        info!("DatabaseStorage initialized at {}", url);
        Ok(Self { db })
    }

    fn into_event(row: events::Model) -> Result<Event, StorageError> {
        let payload: EventPayload = serde_json::from_str(&row.payload).map_err(|e| {
            error!("Invalid payload in row {}: {}", row.id, e);
            StorageError::ReadFailed
        })?;
        Ok(Event {
            id: Uuid::parse_str(&row.event_id).map_err(|_| StorageError::ReadFailed)?,
            timestamp: DateTime::parse_from_rfc3339(&row.ts)
                .map_err(|_| StorageError::ReadFailed)?
                .with_timezone(&Utc),
            src_ip: row.src_ip.parse().map_err(|_| StorageError::ReadFailed)?,
            src_port: u16::try_from(row.src_port).map_err(|_| StorageError::ReadFailed)?,
            protocol: row.protocol,
            payload,
        })
    }
}

#[async_trait]
impl Storage for DatabaseStorage {
    async fn save_event(&self, event: &Event) -> Result<(), StorageError> {
        let payload = serde_json::to_string(&event.payload).map_err(|e| {
            error!("Failed to serialize event {}: {}", event.id, e);
            StorageError::WriteFailed
        })?;
        let row = events::ActiveModel {
            id: NotSet,
            event_id: Set(event.id.to_string()),
            ts: Set(event.timestamp.to_rfc3339()),
            kind: Set(event.kind().as_str().to_string()),
            src_ip: Set(event.src_ip.to_string()),
            src_port: Set(i32::from(event.src_port)),
            protocol: Set(event.protocol.clone()),
            session_id: Set(event.session_id().map(str::to_string)),
            payload: Set(payload),
        };
        events::Entity::insert(row)
            .exec(&self.db)
            .await
            .map_err(|e| {
                error!("Failed to insert event {}: {}", event.id, e);
                StorageError::WriteFailed
            })?;
        debug!("Saved {} event {}", event.kind(), event.id);
        Ok(())
    }

    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>, StorageError> {
        let mut query = events::Entity::find().order_by_desc(Column::Id);
        if let Some(kind) = filter.kind {
            query = query.filter(Column::Kind.eq(kind.as_str()));
        }
        if let Some(ip) = filter.src_ip {
            query = query.filter(Column::SrcIp.eq(ip.to_string()));
        }
        if let Some(ref session_id) = filter.session_id {
            query = query.filter(Column::SessionId.eq(session_id.clone()));
        }
        if let Some(limit) = filter.limit {
            query = query.limit(limit as u64);
        }

        let rows = query.all(&self.db).await.map_err(|e| {
            error!("Failed to query events: {}", e);
            StorageError::ReadFailed
        })?;
        rows.into_iter().rev().map(Self::into_event).collect()
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.db.clone().close().await.map_err(|e| {
            error!("Failed to close database: {}", e);
            StorageError::Closed
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types::EventKind;
    use crate::storage::types::fixtures::sample_events;
    use tempfile::TempDir;

    async fn seeded() -> (TempDir, DatabaseStorage, Vec<Event>) {
        let dir = TempDir::new().unwrap();
        let storage = DatabaseStorage::open(dir.path()).await.unwrap();
        let events = sample_events();
        for event in &events {
            storage.save_event(event).await.unwrap();
        }
        (dir, storage, events)
    }

    #[tokio::test]
    async fn test_round_trip_in_order() {
        let (_dir, storage, events) = seeded().await;
        let all = storage.list_events(&EventFilter::default()).await.unwrap();
        assert_eq!(all, events);
    }

    #[tokio::test]
    async fn test_filters_and_limit() {
        let (_dir, storage, events) = seeded().await;

        let session = storage
            .list_events(&EventFilter::for_session("203.0.113.7_1700000000"))
            .await
            .unwrap();
        assert_eq!(session.len(), 4);
        assert_eq!(session[0].kind(), EventKind::Connection);
        assert_eq!(session[3].kind(), EventKind::SessionEnd);

        let http = storage
            .list_events(&EventFilter {
                src_ip: Some("192.0.2.1".parse().unwrap()),
                kind: Some(EventKind::Connection),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(http.len(), 1);
        assert_eq!(http[0].protocol, "http");

        let latest = storage
            .list_events(&EventFilter {
                limit: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(latest, events[4..].to_vec());
    }

    #[tokio::test]
    async fn test_summaries_and_reopen() {
        let (dir, storage, _) = seeded().await;
        assert_eq!(storage.session_summaries().await.unwrap().len(), 2);
        storage.close().await.unwrap();

        let reopened = DatabaseStorage::open(dir.path()).await.unwrap();
        assert_eq!(
            reopened.list_events(&EventFilter::default()).await.unwrap().len(),
            6
        );
    }
}
