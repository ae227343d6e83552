//! Network layer: one TCP accept loop per configured listener.

pub mod network_listener;

pub use network_listener::NetworkListener;
