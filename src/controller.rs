//! Process orchestration: storage, event writer, listeners and the web interface.

pub mod controller_handler;

pub use controller_handler::Controller;
