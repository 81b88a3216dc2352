//! Configuration loading for dealsync-server.
//!
//! Configuration is loaded from a TOML file (default: `dealsync.toml`).
//! Every field has a default, so a missing section is equivalent to an
//! empty one.

use deal_types::{DealFieldMap, EligibilityRule, MappingError};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for dealsync-server.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Remote CRM configuration.
    #[serde(default)]
    pub crm: CrmConfig,
    /// Credential file configuration.
    #[serde(default)]
    pub credential: CredentialConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP server (default: 0.0.0.0:8080).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Upper bound on one sync call, in seconds (default: 60).
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_database_path")]
    pub database: PathBuf,
}

/// Remote CRM configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CrmConfig {
    /// Category a deal must belong to (default: 0).
    #[serde(default)]
    pub accepted_category_id: i64,
    /// Price type a deal must carry (default: 0).
    #[serde(default)]
    pub accepted_price_type: i64,
    /// Portal-specific custom field holding the price type.
    #[serde(default = "default_price_type_field")]
    pub price_type_field: String,
    /// Per-request HTTP timeout in seconds (default: 20).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Credential file configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialConfig {
    /// Path of the sealed webhook credential.
    #[serde(default = "default_credential_path")]
    pub path: PathBuf,
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_call_timeout_secs() -> u64 {
    60
}

fn default_database_path() -> PathBuf {
    PathBuf::from("dealsync.db")
}

fn default_price_type_field() -> String {
    "UF_CRM_PRICE_TYPE".to_string()
}

fn default_request_timeout_secs() -> u64 {
    20
}

fn default_credential_path() -> PathBuf {
    PathBuf::from("credential.json")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database_path(),
        }
    }
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            accepted_category_id: 0,
            accepted_price_type: 0,
            price_type_field: default_price_type_field(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            path: default_credential_path(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &std::path::Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Build and validate the deal field mapping.
    pub fn field_map(&self) -> Result<DealFieldMap, ConfigError> {
        DealFieldMap::new(&self.crm.price_type_field).map_err(ConfigError::FieldMap)
    }

    /// The eligibility rule for incoming deals.
    pub fn eligibility(&self) -> EligibilityRule {
        EligibilityRule::new(self.crm.accepted_category_id, self.crm.accepted_price_type)
    }

    /// Per-call timeout at the HTTP boundary.
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.server.call_timeout_secs)
    }

    /// Per-request timeout for CRM calls.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.crm.request_timeout_secs)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// The deal field mapping is invalid.
    #[error("invalid field mapping: {0}")]
    FieldMap(#[source] MappingError),
}
