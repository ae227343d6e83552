//! Source-address enrichment backed by MaxMind GeoLite2 databases.
//!
//! Two optional `.mmdb` files are read: a City database for country and city
//! names, and an ASN database for the autonomous system. Lookups never fail:
//! a missing database, an unreadable file or an address the database does
//! not cover all yield `Unknown` for the affected fields.

use std::net::IpAddr;
use std::path::Path;

use log::{debug, info, warn};
use maxminddb::{geoip2, MaxMindDBError, Reader};
use serde::{Deserialize, Serialize};

use crate::configuration::types::GeoIpConfig;

pub const UNKNOWN: &str = "Unknown";
const NAME_LOCALE: &str = "en";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoInfo {
    pub country: String,
    pub city: String,
    #[serde(default)]
    pub asn: Option<u32>,
    #[serde(default)]
    pub org: Option<String>,
}

impl GeoInfo {
    pub fn unknown() -> Self {
        Self {
            country: UNKNOWN.to_string(),
            city: UNKNOWN.to_string(),
            asn: None,
            org: None,
        }
    }

    /// Fills every missing piece with the `Unknown` defaults.
    fn describe(
        country: Option<&str>,
        city: Option<&str>,
        asn: Option<u32>,
        org: Option<&str>,
    ) -> Self {
        let name = |n: Option<&str>| {
            n.filter(|n| !n.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| UNKNOWN.to_string())
        };
        Self {
            country: name(country),
            city: name(city),
            asn,
            org: org.map(str::to_string),
        }
    }
}

pub trait GeoLocator: Send + Sync {
    fn lookup(&self, ip: IpAddr) -> GeoInfo;
}

/// City and ASN readers, either of which may be missing.
#[derive(Default)]
pub struct GeoIpDatabase {
    city: Option<Reader<Vec<u8>>>,
    asn: Option<Reader<Vec<u8>>>,
}

impl GeoIpDatabase {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Opens the configured databases, warning about each one that cannot be used.
    pub fn load(config: &GeoIpConfig) -> Self {
        let db = Self {
            city: open_reader("City", config.city_database.as_deref()),
            asn: open_reader("ASN", config.asn_database.as_deref()),
        };
        if db.is_empty() {
            info!("GeoIP disabled, sources will be reported as {}", UNKNOWN);
        }
        db
    }

    pub fn is_empty(&self) -> bool {
        self.city.is_none() && self.asn.is_none()
    }
}

fn open_reader(label: &str, path: Option<&Path>) -> Option<Reader<Vec<u8>>> {
    let path = path?;
    match Reader::open_readfile(path) {
        Ok(reader) => {
            info!(
                "Loaded GeoIP {} database {} ({})",
                label,
                path.display(),
                reader.metadata.database_type
            );
            Some(reader)
        }
        Err(e) => {
            warn!("GeoIP {} database {} unavailable: {}", label, path.display(), e);
            None
        }
    }
}

/// Treats an uncovered address as absent and logs anything else.
fn found<T>(ip: IpAddr, result: Result<T, MaxMindDBError>) -> Option<T> {
    match result {
        Ok(record) => Some(record),
        Err(MaxMindDBError::AddressNotFoundError(_)) => None,
        Err(e) => {
            debug!("GeoIP lookup for {} failed: {}", ip, e);
            None
        }
    }
}

impl GeoLocator for GeoIpDatabase {
    fn lookup(&self, ip: IpAddr) -> GeoInfo {
        let city = self
            .city
            .as_ref()
            .and_then(|r| found(ip, r.lookup::<geoip2::City>(ip)));
        let asn = self
            .asn
            .as_ref()
            .and_then(|r| found(ip, r.lookup::<geoip2::Asn>(ip)));

        let country_name = city
            .as_ref()
            .and_then(|c| c.country.as_ref())
            .and_then(|c| c.names.as_ref())
            .and_then(|names| names.get(NAME_LOCALE).copied());
        let city_name = city
            .as_ref()
            .and_then(|c| c.city.as_ref())
            .and_then(|c| c.names.as_ref())
            .and_then(|names| names.get(NAME_LOCALE).copied());

        GeoInfo::describe(
            country_name,
            city_name,
            asn.as_ref().and_then(|a| a.autonomous_system_number),
            asn.as_ref().and_then(|a| a.autonomous_system_organization),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn test_describe_fills_unknowns() {
        assert_eq!(GeoInfo::describe(None, None, None, None), GeoInfo::unknown());

        let info = GeoInfo::describe(Some("Japan"), Some(""), Some(64500), Some("Example Transit"));
        assert_eq!(info.country, "Japan");
        assert_eq!(info.city, UNKNOWN);
        assert_eq!(info.asn, Some(64500));
        assert_eq!(info.org.as_deref(), Some("Example Transit"));
    }

    #[test]
    fn test_empty_database_answers_unknown() {
        let db = GeoIpDatabase::empty();
        assert!(db.is_empty());
        assert_eq!(db.lookup("203.0.113.5".parse().unwrap()), GeoInfo::unknown());
        assert_eq!(db.lookup("2001:db8::1".parse().unwrap()), GeoInfo::unknown());
    }

    #[test]
    fn test_load_degrades_on_missing_or_corrupt_files() {
        assert!(GeoIpDatabase::load(&GeoIpConfig::default()).is_empty());

        let mut corrupt = tempfile::NamedTempFile::new().unwrap();
        corrupt.write_all(b"definitely not a maxmind database").unwrap();
        let config = GeoIpConfig {
            city_database: Some(corrupt.path().to_path_buf()),
            asn_database: Some(PathBuf::from("/no/such/GeoLite2-ASN.mmdb")),
        };
        let db = GeoIpDatabase::load(&config);
        assert!(db.is_empty());
        assert_eq!(db.lookup("198.51.100.20".parse().unwrap()), GeoInfo::unknown());
    }
}
