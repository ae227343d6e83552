//! # Network Listener Module
//!
//! Binds one TCP socket per configured listener and hands every accepted
//! connection to that listener's [`Decoy`] on a task of its own.
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────────┐    ┌─────────────────┐
//! │ Incoming        │───▶│ NetworkListener  │───▶│ Decoy::serve    │
//! │ Connections     │    │ (accept loop)    │    │ (task per conn) │
//! └─────────────────┘    └──────────────────┘    └─────────────────┘
//! ```
//!
//! The accept loop stops when the shutdown channel flips to `true`; sessions
//! already running are then awaited before [`NetworkListener::run`] returns.

use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::configuration::types::ListenerConfig;
use crate::decoys::Decoy;
use crate::error_handling::types::NetworkError;

const BACKLOG: u32 = 100;

/// A bound listener and the decoy serving its connections.
pub struct NetworkListener {
    name: String,
    listener: TcpListener,
    decoy: Arc<dyn Decoy>,
}

impl NetworkListener {
    /// Binds the socket described by `config`.
    ///
    /// # Errors
    ///
    /// * `NetworkError::BadAddress` if `bind_host` is not an IP address
    /// * `NetworkError::SockError` if the socket cannot be created or configured
    /// * `NetworkError::BindError` if the address is taken or not permitted
    pub fn bind(config: &ListenerConfig, decoy: Arc<dyn Decoy>) -> Result<Self, NetworkError> {
        let addr = config
            .socket_addr()
            .map_err(|e| NetworkError::BadAddress(e.to_string()))?;

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(|e| {
            error!("[!] Socket error: {:?}", e);
            NetworkError::SockError(e)
        })?;
        socket.set_reuseaddr(true).map_err(NetworkError::SockError)?;
        socket.bind(addr).map_err(|e| {
            error!("[!] Unable to bind {} on {}: {}", config.name, addr, e);
            NetworkError::BindError(e)
        })?;
        let listener = socket.listen(BACKLOG).map_err(NetworkError::BindError)?;

        info!("[{}] Listening on {}", config.name, addr);
        Ok(Self {
            name: config.name.clone(),
            listener,
            decoy,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetworkError> {
        self.listener.local_addr().map_err(NetworkError::SockError)
    }

    /// Accepts connections until shutdown, then waits for open sessions.
    ///
    /// Returns the number of connections accepted.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> usize {
        let mut sessions = JoinSet::new();
        let mut accepted = 0;

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
                incoming = self.listener.accept() => match incoming {
                    Ok((stream, peer)) => {
                        accepted += 1;
                        debug!("[{}] Accepted {}", self.name, peer);
                        let decoy = Arc::clone(&self.decoy);
                        sessions.spawn(async move { decoy.serve(stream, peer).await });
                    }
                    Err(e) => warn!("[{}] Accept failed: {}", self.name, e),
                },
            }
        }

        drop(self.listener);
        info!(
            "[{}] Stopped accepting, waiting for {} open sessions",
            self.name,
            sessions.len()
        );
        while sessions.join_next().await.is_some() {}
        accepted
    }
}
