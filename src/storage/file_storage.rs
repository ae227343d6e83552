use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use log::{debug, error, info, warn};

use crate::error_handling::types::StorageError;
use crate::events::types::Event;
use crate::storage::storage_trait::Storage;
use crate::storage::types::EventFilter;

/// Append-only JSON-lines event log.
///
/// One event per line in `<base>/events.jsonl`. The mutex serializes appends
/// with each other and with reads, so a reader never sees a half-written line.
pub struct FileStorage {
    path: PathBuf,
    log: Mutex<Option<File>>,
}

impl FileStorage {
    pub const LOG_FILE: &'static str = "events.jsonl";

    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, StorageError> {
        let base_path = base_path.as_ref();
        fs::create_dir_all(base_path).map_err(|e| {
            error!("Failed to create storage dir {}: {}", base_path.display(), e);
            StorageError::ConnectionFailed
        })?;
        let path = base_path.join(Self::LOG_FILE);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                error!("Failed to open event log {}: {}", path.display(), e);
                StorageError::ConnectionFailed
            })?;
        info!("FileStorage initialized at {}", path.display());

        Ok(Self {
            path,
            log: Mutex::new(Some(file)),
        })
    }

    fn read_all(&self) -> Result<Vec<Event>, StorageError> {
        let file = File::open(&self.path).map_err(|e| {
            error!("Failed to read event log {}: {}", self.path.display(), e);
            StorageError::ReadFailed
        })?;
        let mut events = Vec::new();
        for (n, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| {
                error!("Failed to read event log {}: {}", self.path.display(), e);
                StorageError::ReadFailed
            })?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Event>(&line) {
                Ok(event) => events.push(event),
                Err(e) => warn!("Skipping corrupt line {} of {}: {}", n + 1, self.path.display(), e),
            }
        }
        Ok(events)
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn save_event(&self, event: &Event) -> Result<(), StorageError> {
        let line = serde_json::to_string(event).map_err(|e| {
            error!("Failed to serialize event {}: {}", event.id, e);
            StorageError::WriteFailed
        })?;
        let mut guard = self.log.lock().map_err(|_| StorageError::WriteFailed)?;
        let file = guard.as_mut().ok_or(StorageError::Closed)?;
        writeln!(file, "{}", line).map_err(|e| {
            error!("Failed to append to {}: {}", self.path.display(), e);
            StorageError::WriteFailed
        })?;
        debug!("Saved {} event {}", event.kind(), event.id);
        Ok(())
    }

    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>, StorageError> {
        let _guard = self.log.lock().map_err(|_| StorageError::ReadFailed)?;
        let events = self.read_all()?;
        Ok(filter.apply(events))
    }

    async fn close(&self) -> Result<(), StorageError> {
        let mut guard = self.log.lock().map_err(|_| StorageError::WriteFailed)?;
        if let Some(mut file) = guard.take() {
            file.flush().map_err(|_| StorageError::WriteFailed)?;
            info!("Closed event log {}", self.path.display());
        }
        Ok(())
    }
}
