//! Storage subsystem
//!
//! This module provides the event store behind the recorder and the
//! reporting interface.
//!
//! Components:
//! - `storage_trait`: the Storage trait defining a uniform async API.
//! - `types`: event filters and per-session summaries.
//! - `database_storage`: ORM-based SQLite implementation using SeaORM.
//! - `file_storage`: JSON-lines implementation for simple persistence and inspection.
//! - `db_entities`: SeaORM entity model for the database backend.

pub mod database_storage;
pub mod db_entities;
pub mod file_storage;
pub mod storage_trait;
pub mod types;

use std::sync::Arc;

use crate::configuration::types::{StorageBackend, StorageConfig};
use crate::error_handling::types::StorageError;

pub use storage_trait::Storage;
pub use types::{EventFilter, SessionSummary};

/// Opens the backend selected in the configuration.
pub async fn open(config: &StorageConfig) -> Result<Arc<dyn Storage>, StorageError> {
    let storage: Arc<dyn Storage> = match config.backend {
        StorageBackend::Database => {
            Arc::new(database_storage::DatabaseStorage::open(&config.path).await?)
        }
        StorageBackend::File => Arc::new(file_storage::FileStorage::new(&config.path)?),
    };
    Ok(storage)
}
