//! # Configuration
//!
//! Application settings read from the environment, after loading an
//! optional `.env` file. Existing environment variables win over the file.
//!
//! | key | default |
//! |---|---|
//! | `APP_DEBUG` | `false` |
//! | `APP_PREFIX` | empty |
//! | `DATABASE_URL` | unset |
//! | `APP_ADDRESS` | `127.0.0.1:8000` |
//! | `APP_MAX_BODY_SIZE` | `1048576` |
//! | `APP_SHUTDOWN_TIMEOUT` | `30` (seconds) |
//! | `APP_SESSION_LIFETIME` | `7200` (seconds) |
//! | `APP_LOG_FORMAT` | `pretty` |

use crate::error::{Error, Result};
use crate::server::ServerConfig;
use crate::telemetry::LogFormat;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Settings for one application process
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Show diagnostics on error pages
    pub debug: bool,
    /// Path prefix the application is mounted under
    pub prefix: String,
    /// Connection URL, if the application uses a database
    pub database_url: Option<String>,
    /// Log output format
    pub log_format: LogFormat,
    /// HTTP server settings
    pub server: ServerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            debug: false,
            prefix: String::new(),
            database_url: None,
            log_format: LogFormat::default(),
            server: ServerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first malformed key.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`; unset keys keep their defaults
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first malformed key.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(raw) = get("APP_DEBUG") {
            config.debug = parse_bool("APP_DEBUG", &raw)?;
        }
        if let Some(prefix) = get("APP_PREFIX") {
            config.prefix = prefix.trim().trim_end_matches('/').to_string();
        }
        config.database_url = get("DATABASE_URL");
        if let Some(raw) = get("APP_LOG_FORMAT") {
            config.log_format = raw.parse()?;
        }
        if let Some(raw) = get("APP_ADDRESS") {
            config.server.address = parse::<SocketAddr>("APP_ADDRESS", &raw)?;
        }
        if let Some(raw) = get("APP_MAX_BODY_SIZE") {
            config.server.max_body_size = parse("APP_MAX_BODY_SIZE", &raw)?;
        }
        if let Some(raw) = get("APP_SHUTDOWN_TIMEOUT") {
            config.server.shutdown_timeout = Duration::from_secs(parse("APP_SHUTDOWN_TIMEOUT", &raw)?);
        }
        if let Some(raw) = get("APP_SESSION_LIFETIME") {
            config.server.session_lifetime = Duration::from_secs(parse("APP_SESSION_LIFETIME", &raw)?);
        }

        Ok(config)
    }
}

fn parse<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| Error::Config {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config {
            key: key.to_string(),
            reason: format!("expected a boolean, got {other:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert!(!config.debug);
        assert!(config.prefix.is_empty());
        assert!(config.database_url.is_none());
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.server.address.port(), 8000);
        assert_eq!(config.server.session_lifetime, Duration::from_secs(7200));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("APP_DEBUG", "true"),
            ("APP_PREFIX", "/blog/"),
            ("DATABASE_URL", "sqlite::memory:"),
            ("APP_ADDRESS", "0.0.0.0:9000"),
            ("APP_MAX_BODY_SIZE", "2048"),
            ("APP_SHUTDOWN_TIMEOUT", "5"),
            ("APP_LOG_FORMAT", "json"),
        ])
        .unwrap();

        assert!(config.debug);
        assert_eq!(config.prefix, "/blog");
        assert_eq!(config.database_url.as_deref(), Some("sqlite::memory:"));
        assert_eq!(config.server.address.port(), 9000);
        assert_eq!(config.server.max_body_size, 2048);
        assert_eq!(config.server.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_malformed_values_name_the_key() {
        let err = load(&[("APP_MAX_BODY_SIZE", "lots")]).unwrap_err();
        assert!(matches!(err, Error::Config { ref key, .. } if key == "APP_MAX_BODY_SIZE"));

        let err = load(&[("APP_DEBUG", "maybe")]).unwrap_err();
        assert!(matches!(err, Error::Config { ref key, .. } if key == "APP_DEBUG"));

        assert!(load(&[("APP_ADDRESS", "localhost")]).is_err());
    }

    #[test]
    fn test_blank_values_keep_defaults() {
        let config = load(&[("APP_DEBUG", "  "), ("DATABASE_URL", "")]).unwrap();
        assert!(!config.debug);
        assert!(config.database_url.is_none());
    }
}
