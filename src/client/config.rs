//! Client configuration
//!
//! Wraps the shared `AppConfig` (server URL, token, store path) and adds the
//! reconnect policy of the event channel.

use std::path::PathBuf;
use std::time::Duration;

use crate::shared::config::{AppConfig, ConfigError};

pub const SERVER_URL_ENV: &str = "TEAMSYNC_SERVER_URL";

/// Exponential backoff for the websocket transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Consecutive failed attempts before the degraded notice is raised
    pub degraded_after: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            degraded_after: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before attempt `attempt` (1-based): base * 2^(attempt-1), capped
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub app: AppConfig,
    pub reconnect: ReconnectPolicy,
}

impl ClientConfig {
    pub fn new(app: AppConfig) -> Self {
        Self {
            app,
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Server URL from `TEAMSYNC_SERVER_URL`, falling back to the default
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut builder = AppConfig::builder();
        if let Ok(url) = std::env::var(SERVER_URL_ENV) {
            builder = builder.server_url(url);
        }
        Ok(Self::new(builder.build()?))
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.app.token = Some(token.into());
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.app.token.as_deref()
    }

    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.app.server_url().trim_end_matches('/'), path)
    }

    pub fn ws_url(&self) -> String {
        self.app.ws_url()
    }

    /// Unread store location: configured path or `<data dir>/teamsync/client.db`
    pub fn store_path(&self) -> PathBuf {
        self.app.store_path.clone().unwrap_or_else(|| {
            let mut path = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
            path.push("teamsync");
            path.push("client.db");
            path
        })
    }
}
