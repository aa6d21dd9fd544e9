/**
 * Authentication Extractor
 *
 * Handlers that require an identity take an `AuthUser` parameter. The
 * extractor reads `Authorization: Bearer <token>`, verifies the token and
 * checks that the user still exists. Any failure rejects the request with 401
 * before the handler body runs.
 */

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use crate::backend::error::BackendError;
use crate::backend::server::state::AppState;
use crate::shared::ids::UserId;

/// Identity of the caller, resolved from the bearer token
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuthUser(pub UserId);

/// Extract the token from an `Authorization: Bearer` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = BackendError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or_else(|| {
            tracing::debug!("[Auth] Missing bearer token on {}", parts.uri.path());
            BackendError::unauthorized("missing bearer token")
        })?;

        let user = state.tokens.verify(token)?;

        // A token can outlive its account
        if state.directory.user(user).await.is_err() {
            tracing::warn!("[Auth] Token for unknown user {}", user);
            return Err(BackendError::unauthorized("unknown user"));
        }

        Ok(AuthUser(user))
    }
}
