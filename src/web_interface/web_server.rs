use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use log::info;
use tokio::sync::watch;

use super::routes::routes;
use crate::configuration::types::WebUiConfig;
use crate::error_handling::types::WebError;
use crate::storage::storage_trait::Storage;

/// Web server for the reporting API and dashboard
pub struct WebServer {
    storage: Arc<dyn Storage>,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(storage: Arc<dyn Storage>, config: &WebUiConfig) -> Result<Self, WebError> {
        let ip: IpAddr = config
            .bind_host
            .parse()
            .map_err(|_| WebError::BadAddress(config.bind_host.clone()))?;
        Ok(Self {
            storage,
            addr: SocketAddr::new(ip, config.port),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serves until the shutdown channel flips to `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), WebError> {
        // warp panics on bind failure, so probe the address first
        std::net::TcpListener::bind(self.addr)
            .map_err(|e| WebError::StartFailed(format!("{}: {}", self.addr, e)))?;

        info!("Web interface available on http://{}", self.addr);
        let server = warp::serve(routes(self.storage)).run(self.addr);
        tokio::select! {
            _ = server => {}
            _ = shutdown.wait_for(|stop| *stop) => {
                info!("Web interface stopped");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::file_storage::FileStorage;
    use tempfile::TempDir;

    fn web_config(host: &str, port: u16) -> WebUiConfig {
        WebUiConfig {
            enabled: true,
            bind_host: host.to_string(),
            port,
        }
    }

    #[test]
    fn test_new_validates_address() {
        let dir = TempDir::new().unwrap();
        let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(dir.path()).unwrap());

        let server = WebServer::new(storage.clone(), &web_config("127.0.0.1", 8080)).unwrap();
        assert_eq!(server.addr(), "127.0.0.1:8080".parse().unwrap());
        assert!(matches!(
            WebServer::new(storage, &web_config("dashboard.local", 8080)),
            Err(WebError::BadAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_run_reports_taken_port() {
        let dir = TempDir::new().unwrap();
        let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(dir.path()).unwrap());
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let server = WebServer::new(storage, &web_config("127.0.0.1", port)).unwrap();
        let (_tx, rx) = watch::channel(false);
        assert!(matches!(server.run(rx).await, Err(WebError::StartFailed(_))));
    }
}
