use thiserror::Error;

/// Errors surfaced by a [`Directory`](super::Directory) implementation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("conflict: {message}")]
    Conflict { message: String },

    #[error("invalid operation: {message}")]
    Invalid { message: String },

    #[error("storage failure: {message}")]
    Backend { message: String },
}

impl StoreError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict { message: message.into() }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid { message: message.into() }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend { message: message.into() }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::not_found("row"),
            other => Self::backend(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
