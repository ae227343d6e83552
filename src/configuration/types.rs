use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::error_handling::types::ConfigError;

fn default_hello_timeout() -> u64 {
    5
}

fn default_credential_timeout() -> u64 {
    30
}

fn default_hostname() -> String {
    String::from("ubuntu-server")
}

fn default_shell_name() -> String {
    String::from("bash")
}

/// The decoy a listener serves, selected by the listener's `name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecoyKind {
    SshLike,
    HttpLike,
}

impl DecoyKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ssh_like" => Some(DecoyKind::SshLike),
            "http_like" => Some(DecoyKind::HttpLike),
            _ => None,
        }
    }

    /// Protocol label stored on every event produced by this decoy.
    pub const fn protocol(self) -> &'static str {
        match self {
            DecoyKind::SshLike => "ssh",
            DecoyKind::HttpLike => "http",
        }
    }
}

/// One `[[listeners]]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerConfig {
    pub name: String,
    pub bind_host: String,
    pub bind_port: u16,
    /// Text sent on connect (SSH-like) or used as the `Server` header (HTTP-like).
    pub banner: String,
    /// Upper bound on an authenticated shell, measured from shell entry.
    pub session_timeout_secs: u64,
    #[serde(default = "default_hello_timeout")]
    pub hello_timeout_secs: u64,
    #[serde(default = "default_credential_timeout")]
    pub credential_timeout_secs: u64,
    #[serde(default = "default_hostname")]
    pub hostname: String,
    #[serde(default = "default_shell_name")]
    pub shell_name: String,
}

impl ListenerConfig {
    pub fn kind(&self) -> Result<DecoyKind, ConfigError> {
        DecoyKind::from_name(&self.name)
            .ok_or_else(|| ConfigError::UnknownService(self.name.clone()))
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.bind_host.parse().map_err(|_| {
            ConfigError::BadIPFormatting(format!(
                "listener '{}' has invalid bind_host '{}'",
                self.name, self.bind_host
            ))
        })?;
        Ok(SocketAddr::new(ip, self.bind_port))
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn hello_timeout(&self) -> Duration {
        Duration::from_secs(self.hello_timeout_secs)
    }

    pub fn credential_timeout(&self) -> Duration {
        Duration::from_secs(self.credential_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Database,
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Directory holding `events.db` or the JSON-lines files.
    #[serde(default = "StorageConfig::default_path")]
    pub path: PathBuf,
}

impl StorageConfig {
    fn default_path() -> PathBuf {
        PathBuf::from("./leurre-data")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: Self::default_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GeoIpConfig {
    /// GeoLite2 City `.mmdb`, for country and city names.
    #[serde(default)]
    pub city_database: Option<PathBuf>,
    /// GeoLite2 ASN `.mmdb`, for the autonomous system and its organization.
    #[serde(default)]
    pub asn_database: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebUiConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "WebUiConfig::default_host")]
    pub bind_host: String,
    #[serde(default = "WebUiConfig::default_port")]
    pub port: u16,
}

impl WebUiConfig {
    fn default_host() -> String {
        String::from("127.0.0.1")
    }

    fn default_port() -> u16 {
        8080
    }
}

impl Default for WebUiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_host: Self::default_host(),
            port: Self::default_port(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// How long shutdown waits for queued events to reach storage.
    #[serde(default = "GeneralConfig::default_grace")]
    pub shutdown_grace_secs: u64,
}

impl GeneralConfig {
    fn default_grace() -> u64 {
        5
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            shutdown_grace_secs: Self::default_grace(),
        }
    }
}
