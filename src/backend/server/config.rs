/**
 * Server Configuration
 *
 * This module handles loading and validation of server configuration.
 *
 * # Configuration Sources
 *
 * Later sources override earlier ones:
 * 1. Built-in defaults suitable for local development
 * 2. An optional TOML file named by `TEAMSYNC_CONFIG`
 * 3. Environment variables: `PORT`, `JWT_SECRET`, `ALLOWED_ORIGINS`
 *    (comma separated), `TOKEN_TTL_SECS`, `BCRYPT_COST`, `DATABASE_PATH`
 *
 * An empty `DATABASE_PATH` runs the server on the in-memory directory.
 *
 * # Example File
 *
 * ```toml
 * bind_addr = "0.0.0.0:8000"
 * jwt_secret = "long-random-string"
 * allowed_origins = ["https://app.example.com"]
 * session_queue_capacity = 256
 * database_path = "/var/lib/teamsync/teamsync.db"
 * ```
 */

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEV_JWT_SECRET: &str = "teamsync-dev-secret-change-me";

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

impl ConfigLoadError {
    fn invalid(key: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid { key, message: message.into() }
    }
}

/// Server settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub token_ttl_secs: u64,
    /// CORS origins allowed to call the REST channel
    pub allowed_origins: Vec<String>,
    /// Bounded outbound queue per connection session
    pub session_queue_capacity: usize,
    /// Interval between websocket pings
    pub keepalive_secs: u64,
    pub bcrypt_cost: u32,
    /// Interval of the stale-session sweep
    pub sweep_interval_secs: u64,
    /// SQLite file; `None` keeps everything in memory
    pub database_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_ttl_secs: 30 * 24 * 60 * 60,
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:3000".to_string(),
            ],
            session_queue_capacity: 256,
            keepalive_secs: 30,
            bcrypt_cost: 10,
            sweep_interval_secs: 300,
            database_path: Some(PathBuf::from("teamsync.db")),
        }
    }
}

impl ServerConfig {
    /// Load defaults, then the optional file, then environment overrides
    pub fn load() -> Result<Self, ConfigLoadError> {
        let mut config = match std::env::var("TEAMSYNC_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;

        if config.jwt_secret == DEV_JWT_SECRET {
            tracing::warn!("[Config] JWT_SECRET not set, using the development secret");
        }
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigLoadError> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply overrides from a key lookup (the process environment in production)
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigLoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            let port: u16 = port
                .trim()
                .parse()
                .map_err(|_| ConfigLoadError::invalid("PORT", port.clone()))?;
            self.bind_addr.set_port(port);
        }
        if let Some(secret) = lookup("JWT_SECRET") {
            self.jwt_secret = secret;
        }
        if let Some(origins) = lookup("ALLOWED_ORIGINS") {
            self.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(ttl) = lookup("TOKEN_TTL_SECS") {
            self.token_ttl_secs = ttl
                .trim()
                .parse()
                .map_err(|_| ConfigLoadError::invalid("TOKEN_TTL_SECS", ttl.clone()))?;
        }
        if let Some(cost) = lookup("BCRYPT_COST") {
            self.bcrypt_cost = cost
                .trim()
                .parse()
                .map_err(|_| ConfigLoadError::invalid("BCRYPT_COST", cost.clone()))?;
        }
        if let Some(path) = lookup("DATABASE_PATH") {
            let path = path.trim();
            self.database_path = (!path.is_empty()).then(|| PathBuf::from(path));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(ConfigLoadError::invalid("jwt_secret", "must not be empty"));
        }
        if self.session_queue_capacity == 0 {
            return Err(ConfigLoadError::invalid("session_queue_capacity", "must be positive"));
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(ConfigLoadError::invalid("bcrypt_cost", "must be between 4 and 31"));
        }
        if self.keepalive_secs == 0 {
            return Err(ConfigLoadError::invalid("keepalive_secs", "must be positive"));
        }
        Ok(())
    }
}
