/**
 * Backend Error Types
 *
 * This module defines error types specific to the server. These errors are
 * returned from HTTP handlers and the websocket handshake and are converted to
 * HTTP responses.
 *
 * # Error Categories
 *
 * ## Request Errors
 *
 * - `Unauthorized` - missing or invalid credential
 * - `AuthorizationDenied` - authenticated, but not a member / not the creator
 * - `NotFound` - stale id referencing a deleted entity
 * - `BadRequest` - invalid input
 * - `Conflict` - uniqueness violation (e.g. duplicate email)
 *
 * ## Internal Errors
 *
 * Token encoding, password hashing, serialization and unexpected store
 * failures all map to 500.
 */

use axum::http::StatusCode;
use thiserror::Error;

use crate::backend::store::StoreError;
use crate::shared::SharedError;

/// Backend-specific error types
///
/// This enum represents all possible errors that can occur in the backend.
/// Each variant can be converted to an HTTP response.
///
/// # Usage
///
/// ```rust
/// use teamsync::backend::error::BackendError;
///
/// let err = BackendError::denied("only the team creator can delete the team");
/// assert_eq!(err.status_code().as_u16(), 403);
/// ```
#[derive(Debug, Error)]
pub enum BackendError {
    /// Missing or invalid credential
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Human-readable error message
        message: String,
    },

    /// Caller is authenticated but not allowed to act on the entity
    #[error("Authorization denied: {message}")]
    AuthorizationDenied {
        /// Human-readable error message
        message: String,
    },

    #[error("{message}")]
    NotFound {
        /// Human-readable error message
        message: String,
    },

    #[error("Bad request: {message}")]
    BadRequest {
        /// Human-readable error message
        message: String,
    },

    #[error("Conflict: {message}")]
    Conflict {
        /// Human-readable error message
        message: String,
    },

    /// Unexpected server-side failure
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable error message
        message: String,
    },

    /// Shared error (from shared module)
    #[error(transparent)]
    SharedError(#[from] SharedError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl BackendError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized { message: message.into() }
    }

    /// Create an authorization-denied error (403)
    pub fn denied(message: impl Into<String>) -> Self {
        Self::AuthorizationDenied { message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound { message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Get the HTTP status code for this error
    ///
    /// # Status Code Mapping
    ///
    /// - `Unauthorized` - 401
    /// - `AuthorizationDenied` - 403
    /// - `NotFound` - 404
    /// - `BadRequest` - 400
    /// - `Conflict` - 409
    /// - `SharedError` - 400 for validation, 500 otherwise
    /// - everything else - 500
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::AuthorizationDenied { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::SharedError(err) => match err {
                SharedError::ValidationError { .. } | SharedError::ProtocolError { .. } => {
                    StatusCode::BAD_REQUEST
                }
                SharedError::SerializationError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::SerializationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error message
    pub fn message(&self) -> String {
        match self {
            Self::Unauthorized { message }
            | Self::AuthorizationDenied { message }
            | Self::NotFound { message }
            | Self::BadRequest { message }
            | Self::Conflict { message }
            | Self::Internal { message } => message.clone(),
            Self::SharedError(err) => err.to_string(),
            Self::SerializationError(err) => err.to_string(),
        }
    }
}

impl From<StoreError> for BackendError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity } => Self::not_found(format!("{} not found", entity)),
            StoreError::Conflict { message } => Self::Conflict { message },
            StoreError::Invalid { message } => Self::bad_request(message),
            StoreError::Backend { message } => Self::internal(message),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for BackendError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::internal(format!("token error: {}", err))
    }
}

impl From<bcrypt::BcryptError> for BackendError {
    fn from(err: bcrypt::BcryptError) -> Self {
        Self::internal(format!("password hashing error: {}", err))
    }
}
