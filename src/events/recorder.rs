//! Fire-and-forget event recording.
//!
//! Sessions hold an [`EventRecorder`] and call [`EventSink::record`] without
//! waiting. Every clone feeds the same unbounded queue, drained by one writer
//! task that owns the storage handle, so events reach storage in the order
//! they were recorded and no two writes ever overlap.

use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;

use super::types::Event;
use crate::storage::storage_trait::Storage;

pub trait EventSink: Send + Sync {
    /// Queues an event. Never blocks and never fails the caller.
    fn record(&self, event: Event);
}

#[derive(Clone)]
pub struct EventRecorder {
    tx: UnboundedSender<Event>,
}

impl EventRecorder {
    /// Starts the writer task.
    ///
    /// The task ends once every recorder clone is dropped and the queue is
    /// drained, returning the number of events stored.
    pub fn spawn(storage: Arc<dyn Storage>) -> (Self, JoinHandle<usize>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
        let writer = tokio::spawn(async move {
            let mut stored = 0;
            while let Some(event) = rx.recv().await {
                match storage.save_event(&event).await {
                    Ok(()) => stored += 1,
                    Err(e) => warn!("Dropping {} event {}: {}", event.kind(), event.id, e),
                }
            }
            debug!("Event writer drained, {} events stored", stored);
            stored
        });
        (Self { tx }, writer)
    }
}

impl EventSink for EventRecorder {
    fn record(&self, event: Event) {
        if let Err(e) = self.tx.send(event) {
            warn!("Event writer is gone, {} event lost", e.0.kind());
        }
    }
}

/// Collects events in memory, for tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemorySink {
    events: std::sync::Mutex<Vec<Event>>,
}

#[cfg(test)]
impl MemorySink {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl EventSink for MemorySink {
    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types::{EventKind, EventPayload};
    use crate::storage::file_storage::FileStorage;
    use crate::storage::types::EventFilter;
    use tempfile::TempDir;

    fn command(n: usize) -> Event {
        Event::new(
            "192.0.2.10:40000".parse().unwrap(),
            "ssh",
            EventPayload::Command {
                session_id: "192.0.2.10_1".into(),
                user: "root".into(),
                command: format!("echo {}", n),
            },
        )
    }

    #[tokio::test]
    async fn test_writer_preserves_order_and_drains() {
        let dir = TempDir::new().unwrap();
        let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(dir.path()).unwrap());
        let (recorder, writer) = EventRecorder::spawn(storage.clone());

        let other = recorder.clone();
        for n in 0..10 {
            if n % 2 == 0 {
                recorder.record(command(n));
            } else {
                other.record(command(n));
            }
        }
        drop(recorder);
        drop(other);

        assert_eq!(writer.await.unwrap(), 10);
        let stored = storage.list_events(&EventFilter::default()).await.unwrap();
        let commands: Vec<String> = stored
            .iter()
            .map(|e| match &e.payload {
                EventPayload::Command { command, .. } => command.clone(),
                _ => panic!("unexpected {:?}", e.kind()),
            })
            .collect();
        let expected: Vec<String> = (0..10).map(|n| format!("echo {}", n)).collect();
        assert_eq!(commands, expected);
        assert!(stored.iter().all(|e| e.kind() == EventKind::Command));
    }

    #[tokio::test]
    async fn test_storage_failures_do_not_reach_caller() {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(FileStorage::new(dir.path()).unwrap());
        storage.close().await.unwrap();
        let (recorder, writer) = EventRecorder::spawn(storage);
        recorder.record(command(1));
        drop(recorder);
        assert_eq!(writer.await.unwrap(), 0);
    }
}
