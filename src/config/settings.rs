//! Application settings loaded from config.toml
//!
//! Every section and field has a default, so a missing or partial `config.toml` still
//! yields a usable configuration. A few values can be overridden from the environment
//! (`BIND_ADDR`, `ADMIN_PASSWORD`) after the file is read.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Default location of the settings file.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener settings
    pub server: ServerSettings,
    /// Input validation limits
    pub limits: Limits,
    /// Login session policy
    pub sessions: SessionSettings,
    /// Stock ledger policy
    pub ledger: LedgerSettings,
    /// Client-side behavior
    pub client: ClientSettings,
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Socket address to bind (e.g. `"0.0.0.0:5274"`)
    pub bind_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5274".to_string(),
        }
    }
}

/// Input validation limits shared by the core and the client pre-checks
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum characters in a material or product name
    pub max_name_length: usize,
    /// Maximum characters in a username
    pub max_username_length: usize,
    /// Maximum characters in a password
    pub max_password_length: usize,
    /// Maximum characters in a supplier or customer note
    pub max_party_length: usize,
    /// Maximum characters in a record detail or restore reason
    pub max_detail_length: usize,
    /// Smallest quantity a ledger operation accepts
    pub min_quantity: i64,
    /// Largest quantity a ledger operation accepts
    pub max_quantity: i64,
    /// Page size used when the caller does not ask for one
    pub default_page_size: u64,
    /// Upper bound on catalog page sizes
    pub max_page_size: u64,
    /// Upper bound on record page sizes
    pub max_records_page_size: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_name_length: 100,
            max_username_length: 50,
            max_password_length: 100,
            max_party_length: 100,
            max_detail_length: 500,
            min_quantity: 1,
            max_quantity: 999_999,
            default_page_size: 20,
            max_page_size: 100,
            max_records_page_size: 200,
        }
    }
}

/// Login session policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Idle time after which a session expires
    pub timeout_secs: u64,
    /// Live sessions allowed per user (the admin account is exempt)
    pub max_concurrent: usize,
    /// Username of the seeded, cap-exempt administrator
    pub admin_username: String,
    /// Password used to seed the administrator when `ADMIN_PASSWORD` is unset
    pub admin_password: Option<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 24 * 60 * 60,
            max_concurrent: 3,
            admin_username: "admin".to_string(),
            admin_password: None,
        }
    }
}

impl SessionSettings {
    /// Session idle timeout as a `chrono` duration.
    #[must_use]
    pub fn timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.timeout_secs).unwrap_or(i64::MAX))
    }
}

/// Stock ledger policy
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    /// When true, restoring a product also returns its consumed materials to stock
    pub restore_returns_materials: bool,
}

/// Client-side behavior
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Seconds between session liveness polls
    pub poll_interval_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
        }
    }
}

impl ClientSettings {
    /// Poll interval as a `std` duration, never shorter than one second.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

/// Parses settings from a TOML string.
///
/// # Errors
/// Returns [`Error::Config`] when the TOML is malformed or a field has the wrong type.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads settings from a TOML file
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML is invalid.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;
    parse_config(&contents)
}

/// Loads settings from the default location, falling back to defaults when the file is
/// absent, then applies environment overrides.
///
/// # Errors
/// Returns an error only if the file exists but cannot be parsed.
pub fn load_app_configuration() -> Result<AppConfig> {
    let mut config = if Path::new(DEFAULT_CONFIG_PATH).exists() {
        debug!("Loading configuration from {DEFAULT_CONFIG_PATH}");
        load_config(DEFAULT_CONFIG_PATH)?
    } else {
        info!("No {DEFAULT_CONFIG_PATH} found, using default settings");
        AppConfig::default()
    };

    if let Ok(bind_addr) = std::env::var("BIND_ADDR") {
        config.server.bind_addr = bind_addr;
    }
    if let Ok(password) = std::env::var("ADMIN_PASSWORD") {
        config.sessions.admin_password = Some(password);
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_config() -> Result<()> {
        let toml_str = r#"
            [server]
            bind_addr = "127.0.0.1:8080"

            [ledger]
            restore_returns_materials = true

            [sessions]
            max_concurrent = 5
        "#;

        let config = parse_config(toml_str)?;
        assert_eq!(config.server.bind_addr, "127.0.0.1:8080");
        assert!(config.ledger.restore_returns_materials);
        assert_eq!(config.sessions.max_concurrent, 5);
        // Untouched fields keep their defaults
        assert_eq!(config.sessions.admin_username, "admin");
        assert_eq!(config.limits.max_quantity, 999_999);
        assert_eq!(config.client.poll_interval_secs, 60);
        Ok(())
    }

    #[test]
    fn test_empty_config_is_default() -> Result<()> {
        let config = parse_config("")?;
        assert!(!config.ledger.restore_returns_materials);
        assert_eq!(config.limits.max_name_length, 100);
        assert_eq!(config.sessions.timeout(), chrono::Duration::hours(24));
        Ok(())
    }

    #[test]
    fn test_malformed_config_is_config_error() {
        let result = parse_config("[server\nbind_addr = 1");
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_poll_interval_never_zero() {
        let settings = ClientSettings {
            poll_interval_secs: 0,
        };
        assert_eq!(settings.poll_interval(), Duration::from_secs(1));
    }
}
