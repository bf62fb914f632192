//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub replica: ReplicaConfig,
    pub auth: AuthConfig,
    pub app: FeedConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 5000)
    pub port: u16,
}

/// Primary database configuration (SQLite)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Secondary (replica) database configuration
///
/// Replication is disabled when `url` is unset or blank.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplicaConfig {
    /// sqlx URL of the secondary store (`postgres://...` or `sqlite:...`)
    pub url: Option<String>,
    /// Connection pool size for the secondary store
    #[serde(default = "default_replica_max_connections")]
    pub max_connections: u32,
    /// Replica writes allowed to run at the same time
    #[serde(default = "default_replica_max_in_flight")]
    pub max_in_flight: usize,
    /// Replica writes allowed to wait; further writes are shed
    #[serde(default = "default_replica_max_pending")]
    pub max_pending: usize,
    /// Timeout for a single replica write attempt
    #[serde(default = "default_replica_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Extra attempts after a failed replica write
    #[serde(default = "default_replica_retry_attempts")]
    pub retry_attempts: u32,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_replica_max_connections(),
            max_in_flight: default_replica_max_in_flight(),
            max_pending: default_replica_max_pending(),
            timeout_seconds: default_replica_timeout_seconds(),
            retry_attempts: default_replica_retry_attempts(),
        }
    }
}

impl ReplicaConfig {
    /// Configured secondary URL, ignoring blank values.
    pub fn url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

fn default_replica_max_connections() -> u32 {
    5
}

fn default_replica_max_in_flight() -> usize {
    8
}

fn default_replica_max_pending() -> usize {
    1024
}

fn default_replica_timeout_seconds() -> u64 {
    30
}

fn default_replica_retry_attempts() -> u32 {
    2
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Session secret key (32+ bytes)
    pub session_secret: String,
    /// Session max age in seconds (default: 604800 = 7 days)
    pub session_max_age: i64,
}

/// Feed and pagination settings
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Page size for explore, profile and message listings
    pub posts_per_page: usize,
    /// Number of own posts shown on the index page
    pub recent_posts: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (CTRACK__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 5000)?
            .set_default("database.path", "data/ctrack.db")?
            .set_default("replica.max_connections", 5)?
            .set_default("replica.max_in_flight", 8)?
            .set_default("replica.max_pending", 1024)?
            .set_default("replica.timeout_seconds", 30)?
            .set_default("replica.retry_attempts", 2)?
            .set_default("auth.session_max_age", 604800)?
            .set_default("app.posts_per_page", 10)?
            .set_default("app.recent_posts", 3)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("CTRACK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub(crate) fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_SESSION_SECRET_BYTES: usize = 32;
        const MAX_SESSION_MAX_AGE_SECONDS: i64 = 366 * 24 * 60 * 60;

        if self.auth.session_secret.as_bytes().len() < MIN_SESSION_SECRET_BYTES {
            return Err(crate::error::AppError::Config(format!(
                "auth.session_secret must be at least {} bytes",
                MIN_SESSION_SECRET_BYTES
            )));
        }

        if self.auth.session_max_age <= 0 || self.auth.session_max_age > MAX_SESSION_MAX_AGE_SECONDS
        {
            return Err(crate::error::AppError::Config(format!(
                "auth.session_max_age must be between 1 and {} seconds",
                MAX_SESSION_MAX_AGE_SECONDS
            )));
        }

        if self.app.posts_per_page == 0 {
            return Err(crate::error::AppError::Config(
                "app.posts_per_page must be greater than 0".to_string(),
            ));
        }

        if self.replica.url().is_some() {
            if self.replica.max_in_flight == 0 || self.replica.max_connections == 0 {
                return Err(crate::error::AppError::Config(
                    "replica.max_in_flight and replica.max_connections must be greater than 0"
                        .to_string(),
                ));
            }
            if self.replica.max_pending < self.replica.max_in_flight {
                return Err(crate::error::AppError::Config(
                    "replica.max_pending must not be smaller than replica.max_in_flight"
                        .to_string(),
                ));
            }
        } else {
            tracing::info!("replica.url is not set; secondary replication disabled");
        }

        Ok(())
    }
}
