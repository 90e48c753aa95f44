//! Configuration module for filedrop.

use serde::Deserialize;
use std::path::Path;

use crate::datetime::BucketZone;
use crate::{FiledropError, Result};

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Base URL used to build absolute links to stored files.
    #[serde(default = "default_public_url")]
    pub public_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// CORS allowed origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Take client addresses from `X-Forwarded-For`/`X-Real-IP`.
    /// Only set this behind a reverse proxy that overwrites those headers.
    #[serde(default)]
    pub trust_proxy_headers: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_public_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: default_public_url(),
            request_timeout_secs: default_request_timeout(),
            cors_origins: vec![],
            trust_proxy_headers: false,
        }
    }
}

/// Upload storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory holding the date buckets.
    #[serde(default = "default_upload_root")]
    pub upload_root: String,
    /// Calendar used for bucket keys: "local" or an IANA zone name (e.g., "UTC").
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Maximum upload size in megabytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size_mb: u64,
}

fn default_upload_root() -> String {
    "uploads".to_string()
}

fn default_timezone() -> String {
    "local".to_string()
}

fn default_max_upload_size() -> u64 {
    10
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_root: default_upload_root(),
            timezone: default_timezone(),
            max_upload_size_mb: default_max_upload_size(),
        }
    }
}

impl StorageConfig {
    /// Maximum upload size in bytes.
    pub fn max_upload_size_bytes(&self) -> usize {
        (self.max_upload_size_mb as usize).saturating_mul(1024 * 1024)
    }
}

/// Admin access configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    /// Shared admin passcode (must be set).
    #[serde(default)]
    pub passcode: String,
    /// Secret used to sign admin tokens. A random secret is generated when empty.
    #[serde(default)]
    pub token_secret: String,
    /// Admin token lifetime in seconds.
    #[serde(default = "default_token_expiry")]
    pub token_expiry_secs: u64,
    /// Admin login attempts allowed per minute and client.
    #[serde(default = "default_login_rate_limit")]
    pub login_rate_limit: u32,
}

fn default_token_expiry() -> u64 {
    900 // 15 minutes
}

fn default_login_rate_limit() -> u32 {
    5
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            passcode: String::new(),
            token_secret: String::new(),
            token_expiry_secs: default_token_expiry(),
            login_rate_limit: default_login_rate_limit(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/filedrop.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Admin configuration.
    #[serde(default)]
    pub admin: AdminConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(FiledropError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| FiledropError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `FILEDROP_ADMIN_PASSCODE`: Override the admin passcode
    /// - `FILEDROP_TOKEN_SECRET`: Override the admin token signing secret
    pub fn apply_env_overrides(&mut self) {
        if let Ok(passcode) = std::env::var("FILEDROP_ADMIN_PASSCODE") {
            if !passcode.is_empty() {
                self.admin.passcode = passcode;
            }
        }
        if let Ok(secret) = std::env::var("FILEDROP_TOKEN_SECRET") {
            if !secret.is_empty() {
                self.admin.token_secret = secret;
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - the admin passcode is not set
    /// - the timezone is neither "local" nor a known IANA zone
    /// - the maximum upload size is zero
    pub fn validate(&self) -> Result<()> {
        if self.admin.passcode.is_empty() {
            return Err(FiledropError::Config(
                "admin passcode is not set. \
                 Set it in config.toml or via FILEDROP_ADMIN_PASSCODE environment variable."
                    .to_string(),
            ));
        }
        BucketZone::parse(&self.storage.timezone)?;
        if self.storage.max_upload_size_mb == 0 {
            return Err(FiledropError::Config(
                "max_upload_size_mb must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
