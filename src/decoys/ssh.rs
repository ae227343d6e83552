use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use tokio::net::TcpStream;

use crate::configuration::types::{DecoyKind, ListenerConfig};
use crate::decoys::Decoy;
use crate::deception::SampledFacts;
use crate::events::recorder::EventSink;
use crate::geoip::GeoLocator;
use crate::session_management::session_handler::{SessionHandler, SessionSettings};

/// Banner, fake login and fake shell over a plain TCP stream.
pub struct SshDecoy {
    handler: SessionHandler,
}

impl SshDecoy {
    pub fn new(
        config: &ListenerConfig,
        sink: Arc<dyn EventSink>,
        geo: Arc<dyn GeoLocator>,
    ) -> Self {
        Self {
            handler: SessionHandler::new(SessionSettings::from(config), sink, geo),
        }
    }
}

#[async_trait]
impl Decoy for SshDecoy {
    fn kind(&self) -> DecoyKind {
        DecoyKind::SshLike
    }

    async fn serve(&self, stream: TcpStream, peer: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not disable Nagle for {}: {}", peer, e);
        }
        self.handler.run(stream, peer, SampledFacts::new()).await;
    }
}
