//! One-shot HTTP decoy.
//!
//! Reads a single request, records its first line and answers every request
//! with the same default Apache page.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::configuration::types::{DecoyKind, ListenerConfig};
use crate::decoys::Decoy;
use crate::events::recorder::EventSink;
use crate::events::types::{Event, EventPayload};
use crate::geoip::GeoLocator;

pub const PROTOCOL: &str = DecoyKind::HttpLike.protocol();
pub const DEFAULT_SERVER: &str = "Apache/2.4.18 (Ubuntu)";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);
const MAX_REQUEST: usize = 8 * 1024;

pub struct HttpDecoy {
    banner: String,
    server: String,
    sink: Arc<dyn EventSink>,
    geo: Arc<dyn GeoLocator>,
}

impl HttpDecoy {
    pub fn new(
        config: &ListenerConfig,
        sink: Arc<dyn EventSink>,
        geo: Arc<dyn GeoLocator>,
    ) -> Self {
        Self {
            banner: config.banner.clone(),
            server: server_header(&config.banner),
            sink,
            geo,
        }
    }

    /// Reads one request, records it and writes the canned page.
    pub async fn respond<S>(&self, mut stream: S, peer: SocketAddr)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let mut buf = vec![0u8; MAX_REQUEST];
        let request = match timeout(REQUEST_TIMEOUT, stream.read(&mut buf)).await {
            Ok(Ok(n)) => request_line(&buf[..n]),
            Ok(Err(e)) => {
                debug!("Read error from {}: {}", peer, e);
                String::new()
            }
            Err(_) => String::new(),
        };
        info!("HTTP request from {}: {:?}", peer, request);

        self.sink.record(Event::new(
            peer,
            PROTOCOL,
            EventPayload::Connection {
                session_id: None,
                banner: self.banner.clone(),
                client_banner: None,
                request: Some(request),
                geo: Some(self.geo.lookup(peer.ip())),
            },
        ));

        let result = async {
            stream.write_all(self.page().as_bytes()).await?;
            stream.shutdown().await
        }
        .await;
        if let Err(e) = result {
            debug!("Could not answer {}: {}", peer, e);
        }
    }

    fn page(&self) -> String {
        let body = format!("<html><body><h1>{}</h1></body></html>", self.server);
        format!(
            "HTTP/1.1 200 OK\r\nServer: {}\r\nContent-Length: {}\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n{}",
            self.server,
            body.len(),
            body
        )
    }
}

#[async_trait]
impl Decoy for HttpDecoy {
    fn kind(&self) -> DecoyKind {
        DecoyKind::HttpLike
    }

    async fn serve(&self, stream: TcpStream, peer: SocketAddr) {
        self.respond(stream, peer).await;
    }
}

/// First line of a raw request, empty when nothing readable arrived.
fn request_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// `Server` header value from a banner such as
/// `HTTP/1.1 200 OK | Server: Apache/2.4.18 (Ubuntu)`.
fn server_header(banner: &str) -> String {
    let from_part = banner
        .split('|')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("Server:"))
        .map(str::trim);
    match from_part {
        Some(server) if !server.is_empty() => server.to_string(),
        _ if !banner.trim().is_empty() && !banner.trim_start().starts_with("HTTP/") => {
            banner.trim().to_string()
        }
        _ => DEFAULT_SERVER.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::recorder::MemorySink;
    use crate::geoip::{GeoInfo, GeoIpDatabase};
    use tokio_test::io::Builder;

    fn decoy(banner: &str, sink: Arc<MemorySink>) -> HttpDecoy {
        HttpDecoy {
            banner: banner.to_string(),
            server: server_header(banner),
            sink,
            geo: Arc::new(GeoIpDatabase::empty()),
        }
    }

    #[test]
    fn test_server_header_from_banner() {
        assert_eq!(
            server_header("HTTP/1.1 200 OK | Server: Apache/2.4.18 (Ubuntu)"),
            "Apache/2.4.18 (Ubuntu)"
        );
        assert_eq!(server_header("nginx/1.14.0"), "nginx/1.14.0");
        assert_eq!(server_header("HTTP/1.1 200 OK"), DEFAULT_SERVER);
        assert_eq!(server_header(""), DEFAULT_SERVER);
    }

    #[test]
    fn test_request_line() {
        assert_eq!(
            request_line(b"GET /wp-login.php HTTP/1.1\r\nHost: x\r\n\r\n"),
            "GET /wp-login.php HTTP/1.1"
        );
        assert_eq!(request_line(b""), "");
    }

    #[tokio::test]
    async fn test_request_is_recorded_and_answered() {
        let sink = Arc::new(MemorySink::default());
        let decoy = decoy("HTTP/1.1 200 OK | Server: Apache/2.4.18 (Ubuntu)", sink.clone());
        let page = decoy.page();
        assert!(page.starts_with("HTTP/1.1 200 OK\r\nServer: Apache/2.4.18 (Ubuntu)\r\n"));
        assert!(page.ends_with("<h1>Apache/2.4.18 (Ubuntu)</h1></body></html>"));

        let stream = Builder::new()
            .read(b"GET /.env HTTP/1.1\r\nHost: 198.51.100.1\r\n\r\n")
            .write(page.as_bytes())
            .build();
        decoy
            .respond(stream, "192.0.2.1:40000".parse().unwrap())
            .await;

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].protocol, "http");
        assert_eq!(events[0].session_id(), None);
        match &events[0].payload {
            EventPayload::Connection { request, geo, .. } => {
                assert_eq!(request.as_deref(), Some("GET /.env HTTP/1.1"));
                assert_eq!(geo.as_ref(), Some(&GeoInfo::unknown()));
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_client_still_gets_page() {
        let sink = Arc::new(MemorySink::default());
        let decoy = decoy("nginx/1.14.0", sink.clone());
        let (mut client, server) = tokio::io::duplex(4096);

        decoy.respond(server, "192.0.2.2:40001".parse().unwrap()).await;

        let mut reply = String::new();
        client.read_to_string(&mut reply).await.unwrap();
        assert!(reply.contains("Server: nginx/1.14.0\r\n"));
        match &sink.events()[0].payload {
            EventPayload::Connection { request, .. } => assert_eq!(request.as_deref(), Some("")),
            other => panic!("unexpected payload {:?}", other),
        }
    }
}
