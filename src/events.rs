//! Attacker activity events and the single-writer recorder that persists them.

pub mod recorder;
pub mod types;

pub use recorder::{EventRecorder, EventSink};
pub use types::{Event, EventKind, EventPayload};
