/**
 * Session Tokens
 *
 * This module handles JWT generation and validation. The same token
 * authenticates the request/response channel (`Authorization: Bearer`) and
 * the event channel handshake.
 */

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::backend::error::BackendError;
use crate::shared::ids::UserId;
use crate::shared::model::UserSummary;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// Email
    pub email: String,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at time (Unix timestamp)
    pub iat: u64,
}

/// Issues and verifies HS256 session tokens
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: u64,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        }
    }

    /// Create a token for a user
    pub fn issue(&self, user: &UserSummary) -> Result<String, BackendError> {
        let now = Utc::now().timestamp().max(0) as u64;
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            exp: now + self.ttl_secs,
            iat: now,
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Verify a token and return the identity it was issued for
    ///
    /// Any decoding failure (bad signature, expiry, malformed subject) is
    /// reported as `Unauthorized`.
    pub fn verify(&self, token: &str) -> Result<UserId, BackendError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default()).map_err(|e| {
            tracing::debug!("[Auth] Token rejected: {}", e);
            BackendError::unauthorized("invalid or expired token")
        })?;
        data.claims
            .sub
            .parse()
            .map_err(|_| BackendError::unauthorized("invalid token subject"))
    }
}
