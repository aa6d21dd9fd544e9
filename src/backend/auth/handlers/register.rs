/**
 * Registration Handler
 *
 * POST /api/auth/register
 *
 * 1. Validate name, email and password
 * 2. Reject an email that is already registered (409)
 * 3. Hash the password with bcrypt
 * 4. Create the user and return a JWT plus the public user view
 */
use axum::{extract::State, http::StatusCode, response::Json};

use crate::backend::auth::password::hash_password;
use crate::backend::error::{BackendError, BackendResult};
use crate::backend::server::state::AppState;
use crate::shared::error::require_non_empty;
use crate::shared::requests::{AuthResponse, Registration};

const MIN_PASSWORD_LEN: usize = 6;

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<Registration>,
) -> BackendResult<(StatusCode, Json<AuthResponse>)> {
    let name = require_non_empty("name", &request.name)?;
    let email = request.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(BackendError::bad_request("a valid email address is required"));
    }
    if request.password.len() < MIN_PASSWORD_LEN {
        return Err(BackendError::bad_request(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    if state.directory.find_user_by_email(&email).await?.is_some() {
        tracing::warn!("[Auth] Registration for existing email: {}", email);
        return Err(BackendError::Conflict {
            message: "email already registered".to_string(),
        });
    }

    let password_hash = hash_password(request.password, state.config.bcrypt_cost).await?;
    let record = state.directory.create_user(&name, &email, &password_hash).await?;
    let token = state.tokens.issue(&record.summary)?;

    tracing::info!("[Auth] Registered user {} ({})", record.summary.id, email);
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: record.summary,
        }),
    ))
}
