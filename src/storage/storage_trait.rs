//! Storage Trait
//!
//! This module defines the `Storage` trait, the interface every event store
//! implements. Writes come from the single event-writer task; reads come from
//! the reporting interface and may run concurrently with writes.
//!
//! Implementors are responsible for:
//! - Persisting each event atomically
//! - Returning events in recording order
//! - Releasing their resources on `close`

use async_trait::async_trait;

use crate::error_handling::types::StorageError;
use crate::events::types::Event;
use crate::storage::types::{summarize, EventFilter, SessionSummary};

#[async_trait]
pub trait Storage: Send + Sync {
    /// Appends one event.
    async fn save_event(&self, event: &Event) -> Result<(), StorageError>;

    /// Events matching `filter`, oldest first.
    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>, StorageError>;

    /// Per-session aggregates, built from the full event log by default.
    async fn session_summaries(&self) -> Result<Vec<SessionSummary>, StorageError> {
        let events = self.list_events(&EventFilter::default()).await?;
        Ok(summarize(&events))
    }

    /// Flushes and releases the backend. Later writes fail with `StorageError::Closed`.
    async fn close(&self) -> Result<(), StorageError>;
}
