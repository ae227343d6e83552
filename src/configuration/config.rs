use super::types::*;
use crate::error_handling::types::ConfigError;
use clap::{ArgAction, Parser};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Runtime configuration loaded from a TOML file.
///
/// ```toml
/// [storage]
/// backend = "file"
/// path = "/var/lib/leurre"
///
/// [[listeners]]
/// name = "ssh_like"
/// bind_host = "0.0.0.0"
/// bind_port = 2222
/// banner = "SSH-2.0-OpenSSH_7.6p1 Ubuntu-4ubuntu0.3"
/// session_timeout_secs = 300
/// ```
///
/// Sections other than `listeners` are optional and fall back to defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub geoip: GeoIpConfig,
    #[serde(default)]
    pub web_ui: WebUiConfig,
    #[serde(default)]
    pub listeners: Vec<ListenerConfig>,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Config, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the controller could not start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listeners.is_empty() {
            return Err(ConfigError::ListenersEmpty(String::from(
                "at least one [[listeners]] entry is required",
            )));
        }

        let mut binds = HashSet::new();
        for listener in &self.listeners {
            listener.kind()?;
            let addr = listener.socket_addr()?;
            if !binds.insert(addr) {
                return Err(ConfigError::BadPortsRange(format!(
                    "{} is configured more than once",
                    addr
                )));
            }
            if listener.session_timeout_secs == 0
                || listener.hello_timeout_secs == 0
                || listener.credential_timeout_secs == 0
            {
                return Err(ConfigError::NotInRange(format!(
                    "listener '{}' timeouts must be greater than zero",
                    listener.name
                )));
            }
        }

        if self.web_ui.enabled {
            let web_addr = format!("{}:{}", self.web_ui.bind_host, self.web_ui.port);
            if web_addr.parse::<std::net::SocketAddr>().is_err() {
                return Err(ConfigError::BadIPFormatting(format!(
                    "web_ui bind_host '{}' is not an IP address",
                    self.web_ui.bind_host
                )));
            }
        }
        Ok(())
    }
}

/// Command-line arguments. Flags override the matching file settings.
#[derive(Parser, Debug, Clone)]
#[command(name = "leurre")]
#[command(version)]
#[command(about = "Low-interaction SSH/HTTP deception service")]
pub struct Cli {
    /// Path to the TOML configuration file
    pub config_file: PathBuf,

    /// Directory for recorded events, overriding `[storage] path`
    #[arg(long, env = "LEURRE_STORAGE_PATH")]
    pub storage_path: Option<PathBuf>,

    /// Log at debug level
    #[arg(long, env = "LEURRE_VERBOSE", action = ArgAction::SetTrue)]
    pub verbose: bool,

    /// Serve the reporting interface even if the file leaves it disabled
    #[arg(long, action = ArgAction::SetTrue)]
    pub web_ui: bool,
}

impl Cli {
    pub fn apply(&self, config: &mut Config) {
        if let Some(path) = &self.storage_path {
            config.storage.path = path.clone();
        }
        if self.web_ui {
            config.web_ui.enabled = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    const SAMPLE: &str = r#"
[storage]
backend = "file"
path = "/tmp/leurre"

[geoip]
city_database = "/var/lib/GeoIP/GeoLite2-City.mmdb"

[[listeners]]
name = "ssh_like"
bind_host = "0.0.0.0"
bind_port = 2222
banner = "SSH-2.0-OpenSSH_7.6p1 Ubuntu-4ubuntu0.3"
session_timeout_secs = 300

[[listeners]]
name = "http_like"
bind_host = "127.0.0.1"
bind_port = 8081
banner = "Apache/2.4.29 (Ubuntu)"
session_timeout_secs = 10
hostname = "web01"
"#;

    #[test]
    fn test_parse_sample() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.listeners.len(), 2);
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.general.shutdown_grace_secs, 5);
        assert!(!config.web_ui.enabled);

        let ssh = &config.listeners[0];
        assert_eq!(ssh.kind().unwrap(), DecoyKind::SshLike);
        assert_eq!(ssh.hello_timeout_secs, 5);
        assert_eq!(ssh.credential_timeout_secs, 30);
        assert_eq!(ssh.hostname, "ubuntu-server");
        assert_eq!(ssh.shell_name, "bash");
        assert_eq!(config.listeners[1].hostname, "web01");
        assert_eq!(
            config.listeners[1].socket_addr().unwrap().to_string(),
            "127.0.0.1:8081"
        );
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(
            config.geoip.city_database,
            Some(PathBuf::from("/var/lib/GeoIP/GeoLite2-City.mmdb"))
        );
        assert_eq!(config.geoip.asn_database, None);
        assert!(matches!(
            Config::from_file(Path::new("/definitely/not/here.toml")),
            Err(ConfigError::IoError(_))
        ));
    }

    #[test]
    fn test_rejects_invalid_configs() {
        assert!(matches!(
            Config::from_toml_str("[storage]\nbackend = \"file\"\n"),
            Err(ConfigError::ListenersEmpty(_))
        ));
        assert!(matches!(
            Config::from_toml_str("listeners = 3"),
            Err(ConfigError::TomlError(_))
        ));

        let unknown = SAMPLE.replace("http_like", "telnet_like");
        assert!(matches!(
            Config::from_toml_str(&unknown),
            Err(ConfigError::UnknownService(name)) if name == "telnet_like"
        ));

        let bad_ip = SAMPLE.replace("127.0.0.1", "localhost");
        assert!(matches!(
            Config::from_toml_str(&bad_ip),
            Err(ConfigError::BadIPFormatting(_))
        ));

        let duplicate = SAMPLE.replace("bind_port = 8081", "bind_port = 2222")
            .replace("127.0.0.1", "0.0.0.0");
        assert!(matches!(
            Config::from_toml_str(&duplicate),
            Err(ConfigError::BadPortsRange(_))
        ));

        let zero = SAMPLE.replace("session_timeout_secs = 10", "session_timeout_secs = 0");
        assert!(matches!(
            Config::from_toml_str(&zero),
            Err(ConfigError::NotInRange(_))
        ));
    }

    #[test]
    #[serial]
    fn test_cli_overrides() {
        std::env::remove_var("LEURRE_STORAGE_PATH");
        std::env::remove_var("LEURRE_VERBOSE");
        let cli = Cli::try_parse_from(["leurre", "conf.toml", "--storage-path", "/srv/events", "--web-ui"])
            .unwrap_or_else(|e| panic!("{}", e));
        assert_eq!(cli.config_file, PathBuf::from("conf.toml"));
        assert!(!cli.verbose);

        let mut config = Config::from_toml_str(SAMPLE).unwrap();
        cli.apply(&mut config);
        assert_eq!(config.storage.path, PathBuf::from("/srv/events"));
        assert!(config.web_ui.enabled);
    }

    #[test]
    #[serial]
    fn test_cli_reads_environment() {
        std::env::set_var("LEURRE_STORAGE_PATH", "/var/lib/leurre");
        std::env::set_var("LEURRE_VERBOSE", "true");
        let cli = Cli::try_parse_from(["leurre", "conf.toml"]).unwrap_or_else(|e| panic!("{}", e));
        std::env::remove_var("LEURRE_STORAGE_PATH");
        std::env::remove_var("LEURRE_VERBOSE");

        assert_eq!(cli.storage_path, Some(PathBuf::from("/var/lib/leurre")));
        assert!(cli.verbose);
        assert!(!cli.web_ui);
    }

    #[test]
    fn test_shipped_sample_is_valid() {
        let config = Config::from_toml_str(include_str!("../../config/leurre.toml")).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Database);
        assert!(config.web_ui.enabled);
        let kinds: Vec<DecoyKind> = config.listeners.iter().map(|l| l.kind().unwrap()).collect();
        assert_eq!(kinds, vec![DecoyKind::SshLike, DecoyKind::HttpLike]);
    }

    #[test]
    fn test_missing_config_argument() {
        assert!(Cli::try_parse_from(["leurre"]).is_err());
    }
}
