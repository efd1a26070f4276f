//! Application settings loaded from `config.toml`.
//!
//! Every section is optional; missing values fall back to defaults so a bare
//! checkout starts with a local `SQLite` file. `DATABASE_URL` and `FACTLY_BIND`
//! override the file when set.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener settings
    pub server: ServerConfig,
    /// Database location and startup checks
    pub database: DatabaseConfig,
    /// Response cache settings
    pub cache: CacheConfig,
    /// Invitation lifetime
    pub invitations: InvitationConfig,
    /// Session lifetime
    pub sessions: SessionConfig,
}

/// `[server]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to bind, e.g. `127.0.0.1:3000`
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

/// `[database]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SeaORM connection URL
    pub url: String,
    /// Attempts made by the startup connectivity check
    pub connect_attempts: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/factly.sqlite?mode=rwc".to_string(),
            connect_attempts: 3,
        }
    }
}

/// `[cache]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime of a cached list response
    pub ttl_seconds: u64,
    /// Upper bound on cached responses
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 60,
            max_entries: 10_000,
        }
    }
}

impl CacheConfig {
    /// TTL as a [`Duration`].
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

/// `[invitations]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InvitationConfig {
    /// Days before a pending invitation expires
    pub ttl_days: i64,
}

impl Default for InvitationConfig {
    fn default() -> Self {
        Self { ttl_days: 7 }
    }
}

/// `[sessions]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Hours a session token stays valid
    pub ttl_hours: i64,
    /// Shared secret the identity provider presents to open sessions;
    /// session creation over HTTP is disabled when unset
    pub bridge_secret: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_hours: 24 * 30,
            bridge_secret: None,
        }
    }
}

/// Loads configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    parse_config(&contents)
}

/// Parses configuration from TOML text.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &AppConfig) -> Result<()> {
    if config.database.connect_attempts == 0 {
        return Err(Error::Config {
            message: "database.connect_attempts must be at least 1".to_string(),
        });
    }
    if config.cache.max_entries == 0 {
        return Err(Error::Config {
            message: "cache.max_entries must be at least 1".to_string(),
        });
    }
    if config.invitations.ttl_days <= 0 {
        return Err(Error::Config {
            message: "invitations.ttl_days must be positive".to_string(),
        });
    }
    if config.sessions.ttl_hours <= 0 {
        return Err(Error::Config {
            message: "sessions.ttl_hours must be positive".to_string(),
        });
    }
    Ok(())
}

/// Loads `./config.toml` when present, then applies environment overrides.
///
/// A missing file is not an error: defaults are used instead.
pub fn load_app_config() -> Result<AppConfig> {
    let path = std::env::var("FACTLY_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let mut config = if Path::new(&path).exists() {
        tracing::debug!("Loading configuration from {path}");
        load_config(&path)?
    } else {
        tracing::info!("No configuration file at {path}, using defaults");
        AppConfig::default()
    };

    if let Ok(url) = std::env::var("DATABASE_URL") {
        config.database.url = url;
    }
    if let Ok(bind) = std::env::var("FACTLY_BIND") {
        config.server.bind = bind;
    }
    if let Ok(secret) = std::env::var("FACTLY_BRIDGE_SECRET") {
        config.sessions.bridge_secret = Some(secret);
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            [server]
            bind = "0.0.0.0:8080"

            [database]
            url = "sqlite::memory:"
            connect_attempts = 5

            [cache]
            ttl_seconds = 10
            max_entries = 500

            [invitations]
            ttl_days = 3

            [sessions]
            ttl_hours = 12
            bridge_secret = "s3cret"
        "#;

        let config = parse_config(toml_str).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.database.connect_attempts, 5);
        assert_eq!(config.cache.ttl(), Duration::from_secs(10));
        assert_eq!(config.cache.max_entries, 500);
        assert_eq!(config.invitations.ttl_days, 3);
        assert_eq!(config.sessions.ttl_hours, 12);
        assert_eq!(config.sessions.bridge_secret.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = parse_config("[cache]\nttl_seconds = 5\n").unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:3000");
        assert_eq!(config.database.connect_attempts, 3);
        assert_eq!(config.invitations.ttl_days, 7);
        assert_eq!(config.cache.ttl_seconds, 5);
        assert_eq!(config.cache.max_entries, 10_000);
        assert_eq!(config.sessions.bridge_secret, None);
    }

    #[test]
    fn test_rejects_zero_connect_attempts() {
        let result = parse_config("[database]\nconnect_attempts = 0\n");
        assert!(matches!(result, Err(Error::Config { message: _ })));
    }

    #[test]
    fn test_rejects_invalid_toml() {
        let result = parse_config("[server\nbind = 1");
        assert!(matches!(result, Err(Error::Config { message: _ })));
    }
}
