//! Configuration file parsing for the server.
//!
//! Loads settings from TOML files including bind address, JWT secret,
//! database location, gating thresholds, the scorer API and the optional
//! bypass window.

use passgate_domain::{BypassWindow, Clock, SystemClock};
use passgate_gatekeeper::GatingConfig;
use passgate_provider::passport::DEFAULT_ENDPOINT;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Server configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Missing required field
    #[error("Missing required configuration field: {0}")]
    MissingField(String),

    /// Field present but unusable
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Server configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1")
    pub bind_address: String,

    /// Bind port (e.g., 8080)
    pub bind_port: u16,

    /// JWT secret for verifying bearer tokens
    pub jwt_secret: String,

    /// Lifetime of issued tokens in seconds (default: 3600 = 1 hour)
    #[serde(default = "default_token_expiry")]
    pub token_expiry_secs: u64,

    /// SQLite database path
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Age after which a cached score is reported stale (default: 7 days)
    #[serde(default = "default_score_max_age")]
    pub score_max_age_secs: u64,

    /// Gating settings
    #[serde(default)]
    pub gating: GatingConfig,

    /// Scorer API settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Grace period; absent means gating is always enforced
    #[serde(default)]
    pub bypass: Option<BypassConfig>,
}

/// Scorer API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// API root (e.g., "https://api.scorer.gitcoin.co")
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Scorer API key
    #[serde(default)]
    pub api_key: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: String::new(),
        }
    }
}

/// Bypass window configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BypassConfig {
    /// Unix second the window opens (default: server start)
    #[serde(default)]
    pub starts_at: Option<u64>,

    /// Window length in seconds
    pub duration_secs: u64,
}

/// Default token expiry: 1 hour
fn default_token_expiry() -> u64 {
    3600
}

fn default_database_path() -> String {
    "passgate.db".to_string()
}

/// Default staleness threshold: 7 days
fn default_score_max_age() -> u64 {
    7 * 24 * 3600
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

impl ServerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check required fields and value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::MissingField("jwt_secret".to_string()));
        }
        if self.gating.enabled && self.provider.api_key.is_empty() {
            return Err(ConfigError::MissingField("provider.api_key".to_string()));
        }
        self.gating
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("gating: {}", e)))?;
        Ok(())
    }

    /// Create a default configuration for testing
    pub fn default_test_config() -> Self {
        ServerConfig {
            bind_address: "127.0.0.1".to_string(),
            bind_port: 8080,
            jwt_secret: "test-secret-key-do-not-use-in-production".to_string(),
            token_expiry_secs: 3600,
            database_path: ":memory:".to_string(),
            score_max_age_secs: default_score_max_age(),
            gating: GatingConfig::enabled("335", 20.0),
            provider: ProviderConfig {
                endpoint: "http://localhost:9000".to_string(),
                api_key: "test-api-key".to_string(),
            },
            bypass: None,
        }
    }

    /// Get the full bind address (address:port)
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.bind_port)
    }

    /// Build the bypass window, opening it now if no start was configured
    pub fn bypass_window(&self) -> BypassWindow {
        match &self.bypass {
            Some(bypass) => BypassWindow::starting_at(
                bypass.starts_at.unwrap_or_else(|| SystemClock.now()),
                Duration::from_secs(bypass.duration_secs),
            ),
            None => BypassWindow::disabled(),
        }
    }
}
