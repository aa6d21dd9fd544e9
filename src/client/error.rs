//! Client Error Types
//!
//! `AuthorizationDenied` and `NotFound` come straight from 403/404 responses.
//! `TransportLost` is only surfaced when the event channel cannot be used at
//! all; ordinary disconnects are handled by the transport's reconnect loop.

use thiserror::Error;

use crate::shared::config::ConfigError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Authorization denied: {message}")]
    AuthorizationDenied { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Live updates unavailable")]
    TransportLost,

    /// The server rejected an optimistically applied change
    #[error("Update rejected: {message}")]
    OptimisticMismatch { message: String },

    #[error("Server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// Map a non-success status and the server's error message
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            403 => Self::AuthorizationDenied { message },
            404 => Self::NotFound { message },
            _ => Self::Api { status, message },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(ClientError::from_status(403, "x"), ClientError::AuthorizationDenied { .. }));
        assert!(ClientError::from_status(404, "x").is_not_found());
        assert!(matches!(
            ClientError::from_status(409, "dup"),
            ClientError::Api { status: 409, .. }
        ));
    }
}
