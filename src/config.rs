//! Runtime configuration read from the environment
//!
//! Every setting has a default so the service starts with an empty
//! environment. A `.env` file is loaded by `main` before `Config::from_env`.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server listens on
    pub port: u16,
    /// Path of the embedded database file
    pub database_url: String,
    /// Base URL used to build shareable scan links
    pub public_url: String,
    /// Shared secret for the management API; `None` leaves it open
    pub authorization: Option<String>,
    /// Primary network-address geolocation service
    pub ipapi_url: String,
    /// Backup network-address geolocation service
    pub ipinfo_url: String,
    /// Reverse-geocoding service
    pub nominatim_url: String,
    /// Per-request timeout for the lookup services
    pub lookup_timeout: Duration,
    /// Mark visitor cookies `Secure`
    pub cookie_secure: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            database_url: "data.db".to_string(),
            public_url: "http://localhost:8080".to_string(),
            authorization: None,
            ipapi_url: "https://ipapi.co".to_string(),
            ipinfo_url: "https://ipinfo.io".to_string(),
            nominatim_url: "https://nominatim.openstreetmap.org".to_string(),
            lookup_timeout: Duration::from_secs(5),
            cookie_secure: false,
        }
    }
}

impl Config {
    /// Builds the configuration from environment variables
    ///
    /// - `PORT` (default: 8080)
    /// - `DATABASE_URL` (default: "data.db")
    /// - `PUBLIC_URL` (default: "http://localhost:8080")
    /// - `AUTHORIZATION` (default: unset)
    /// - `IPAPI_URL`, `IPINFO_URL`, `NOMINATIM_URL`
    /// - `LOOKUP_TIMEOUT_SECS` (default: 5)
    /// - `COOKIE_SECURE` (default: false)
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Self {
            port: parsed("PORT", defaults.port),
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            public_url: env::var("PUBLIC_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.public_url),
            authorization: env::var("AUTHORIZATION").ok().filter(|s| !s.is_empty()),
            ipapi_url: env::var("IPAPI_URL").unwrap_or(defaults.ipapi_url),
            ipinfo_url: env::var("IPINFO_URL").unwrap_or(defaults.ipinfo_url),
            nominatim_url: env::var("NOMINATIM_URL").unwrap_or(defaults.nominatim_url),
            lookup_timeout: Duration::from_secs(parsed(
                "LOOKUP_TIMEOUT_SECS",
                defaults.lookup_timeout.as_secs(),
            )),
            cookie_secure: parsed("COOKIE_SECURE", defaults.cookie_secure),
        }
    }

    /// Shareable URL for a short code
    pub fn scan_url(&self, code: &str) -> String {
        format!("{}/scan/{}", self.public_url, code)
    }
}

fn parsed<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
