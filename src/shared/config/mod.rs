//! Application configuration module
//!
//! Connection settings shared by anything that talks to the server: the base
//! URL of the request/response channel, the event channel URL derived from it,
//! and the bearer credential used by both.

use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";

/// Application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Server URL
    pub server_url: Option<String>,
    /// Bearer token for both channels
    pub token: Option<String>,
    /// Location of the durable client store
    pub store_path: Option<PathBuf>,
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    pub fn server_url(&self) -> &str {
        self.server_url.as_deref().unwrap_or(DEFAULT_SERVER_URL)
    }

    /// Event channel URL: same host, `ws`/`wss` scheme, `/ws` path
    pub fn ws_url(&self) -> String {
        let base = self.server_url().trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        };
        format!("{}/ws", base)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.server_url();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl(url.to_string()));
        }
        Ok(())
    }
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    server_url: Option<String>,
    token: Option<String>,
    store_path: Option<PathBuf>,
}

impl AppConfigBuilder {
    /// Set the server URL
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        let config = AppConfig {
            server_url: self.server_url,
            token: self.token,
            store_path: self.store_path,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_url_derivation() {
        let config = AppConfig::builder().server_url("http://localhost:8000/").build().unwrap();
        assert_eq!(config.ws_url(), "ws://localhost:8000/ws");

        let secure = AppConfig::builder().server_url("https://sync.example.com").build().unwrap();
        assert_eq!(secure.ws_url(), "wss://sync.example.com/ws");
    }

    #[test]
    fn test_invalid_url_rejected() {
        let result = AppConfig::builder().server_url("ftp://nope").build();
        assert!(matches!(result, Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_default_server_url() {
        let config = AppConfig::default();
        assert_eq!(config.server_url(), DEFAULT_SERVER_URL);
        assert!(config.validate().is_ok());
    }
}
