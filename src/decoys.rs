//! Protocol decoys.
//!
//! A decoy owns everything protocol-specific about a listener: what the
//! peer sees and which events the conversation produces. Listeners accept
//! connections and hand each one to [`Decoy::serve`] on its own task.

pub mod http;
pub mod ssh;

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::configuration::types::{DecoyKind, ListenerConfig};
use crate::error_handling::types::ConfigError;
use crate::events::recorder::EventSink;
use crate::geoip::GeoLocator;

#[async_trait]
pub trait Decoy: Send + Sync {
    fn kind(&self) -> DecoyKind;

    /// Handles one accepted connection until it is closed.
    async fn serve(&self, stream: TcpStream, peer: SocketAddr);
}

/// Builds the decoy named by a listener entry.
pub fn build(
    config: &ListenerConfig,
    sink: Arc<dyn EventSink>,
    geo: Arc<dyn GeoLocator>,
) -> Result<Arc<dyn Decoy>, ConfigError> {
    let decoy: Arc<dyn Decoy> = match config.kind()? {
        DecoyKind::SshLike => Arc::new(ssh::SshDecoy::new(config, sink, geo)),
        DecoyKind::HttpLike => Arc::new(http::HttpDecoy::new(config, sink, geo)),
    };
    Ok(decoy)
}
