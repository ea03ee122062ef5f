//! Configuration management
//!
//! This module handles loading and parsing configuration for myblog.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// JWT secret used when none is configured. Only suitable for development.
pub const DEFAULT_JWT_SECRET: &str = "default_jwt_secret_for_development";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Token configuration
    #[serde(default)]
    pub auth: AuthConfig,
    /// Exclusive lock backend
    #[serde(default)]
    pub lock: LockConfig,
    /// Batch job settings
    #[serde(default)]
    pub batch: BatchConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
    /// Requests running longer than this are answered with 408
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// How long in-flight requests may run after a shutdown signal
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
            request_timeout_secs: default_request_timeout_secs(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Connection URL of the primary (write) database
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Optional connection URL for reads. Reads use `url` when unset.
    #[serde(default)]
    pub read_url: Option<String>,
    /// Maximum open connections per pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Maximum lifetime of a pooled connection, in seconds
    #[serde(default = "default_max_lifetime_secs")]
    pub max_lifetime_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
            read_url: None,
            max_connections: default_max_connections(),
            max_lifetime_secs: default_max_lifetime_secs(),
        }
    }
}

impl DatabaseConfig {
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }
}

fn default_database_url() -> String {
    "data/myblog.db".to_string()
}

fn default_max_connections() -> u32 {
    25
}

fn default_max_lifetime_secs() -> u64 {
    5 * 60
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for signing access tokens
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Token lifetime in hours
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            token_ttl_hours: default_token_ttl_hours(),
        }
    }
}

impl AuthConfig {
    /// Whether the built-in development secret is in use
    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }
}

fn default_jwt_secret() -> String {
    DEFAULT_JWT_SECRET.to_string()
}

fn default_token_ttl_hours() -> i64 {
    24
}

/// Exclusive lock configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LockConfig {
    /// Lock store backend
    #[serde(default)]
    pub driver: LockDriver,
    /// Redis connection URL (redis driver only)
    #[serde(default)]
    pub redis_url: Option<String>,
}

/// Lock store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LockDriver {
    /// `locks` table in the application database (default)
    #[default]
    Database,
    /// In-process store; only serializes callers inside one process
    Memory,
    /// Redis `SET NX PX`
    Redis,
}

/// Batch job configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// TTL of the ranking batch lock, in seconds
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            lock_ttl_secs: default_lock_ttl_secs(),
        }
    }
}

impl BatchConfig {
    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }
}

fn default_lock_ttl_secs() -> u64 {
    10 * 60
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - MYBLOG_SERVER_HOST / MYBLOG_SERVER_PORT (or PORT)
    /// - MYBLOG_SERVER_REQUEST_TIMEOUT_SECS
    /// - MYBLOG_DATABASE_DRIVER / MYBLOG_DATABASE_URL / MYBLOG_DATABASE_READ_URL
    /// - MYBLOG_AUTH_JWT_SECRET (or JWT_SECRET)
    /// - MYBLOG_LOCK_DRIVER / MYBLOG_LOCK_REDIS_URL
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::read_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("MYBLOG_SERVER_HOST") {
            self.server.host = host;
        }
        let port = std::env::var("MYBLOG_SERVER_PORT").or_else(|_| std::env::var("PORT"));
        if let Ok(port) = port {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(secs) = std::env::var("MYBLOG_SERVER_REQUEST_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse::<u64>() {
                self.server.request_timeout_secs = secs;
            }
        }

        if let Ok(driver) = std::env::var("MYBLOG_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {}
            }
        }
        if let Ok(url) = std::env::var("MYBLOG_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(url) = std::env::var("MYBLOG_DATABASE_READ_URL") {
            self.database.read_url = Some(url);
        }

        let secret = std::env::var("MYBLOG_AUTH_JWT_SECRET").or_else(|_| std::env::var("JWT_SECRET"));
        if let Ok(secret) = secret {
            if !secret.is_empty() {
                self.auth.jwt_secret = secret;
            }
        }

        if let Ok(driver) = std::env::var("MYBLOG_LOCK_DRIVER") {
            match driver.to_lowercase().as_str() {
                "database" => self.lock.driver = LockDriver::Database,
                "memory" => self.lock.driver = LockDriver::Memory,
                "redis" => self.lock.driver = LockDriver::Redis,
                _ => {}
            }
        }
        if let Ok(url) = std::env::var("MYBLOG_LOCK_REDIS_URL") {
            self.lock.redis_url = Some(url);
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "server.request_timeout_secs must be positive".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.auth.token_ttl_hours <= 0 {
            return Err(ConfigError::ValidationError(
                "auth.token_ttl_hours must be positive".to_string(),
            ));
        }
        if self.batch.lock_ttl_secs == 0 {
            return Err(ConfigError::ValidationError(
                "batch.lock_ttl_secs must be positive".to_string(),
            ));
        }
        if self.lock.driver == LockDriver::Redis && self.lock.redis_url.is_none() {
            return Err(ConfigError::ValidationError(
                "lock.redis_url is required when lock.driver is redis".to_string(),
            ));
        }
        Ok(())
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared by `tests` and `property_tests`: both mutate the process environment.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const ENV_VARS: &[&str] = &[
    "MYBLOG_SERVER_HOST",
    "MYBLOG_SERVER_PORT",
    "PORT",
    "MYBLOG_SERVER_REQUEST_TIMEOUT_SECS",
    "MYBLOG_DATABASE_DRIVER",
    "MYBLOG_DATABASE_URL",
    "MYBLOG_DATABASE_READ_URL",
    "MYBLOG_AUTH_JWT_SECRET",
    "JWT_SECRET",
    "MYBLOG_LOCK_DRIVER",
    "MYBLOG_LOCK_REDIS_URL",
];

#[cfg(test)]
fn clear_env() {
    for var in ENV_VARS {
        std::env::remove_var(var);
    }
}
