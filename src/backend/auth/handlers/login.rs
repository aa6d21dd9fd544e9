/**
 * Login Handler
 *
 * POST /api/auth/login
 *
 * Unknown email and wrong password return the same 401 so the endpoint does
 * not reveal which accounts exist.
 */
use axum::{extract::State, response::Json};

use crate::backend::auth::password::verify_password;
use crate::backend::error::{BackendError, BackendResult};
use crate::backend::server::state::AppState;
use crate::shared::requests::{AuthResponse, Credentials};

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<Credentials>,
) -> BackendResult<Json<AuthResponse>> {
    let record = state
        .directory
        .find_user_by_email(&request.email)
        .await?
        .ok_or_else(|| {
            tracing::warn!("[Auth] Login for unknown email: {}", request.email);
            BackendError::unauthorized("invalid email or password")
        })?;

    if !verify_password(request.password, record.password_hash.clone()).await? {
        tracing::warn!("[Auth] Invalid password for user {}", record.summary.id);
        return Err(BackendError::unauthorized("invalid email or password"));
    }

    let token = state.tokens.issue(&record.summary)?;
    tracing::info!("[Auth] User logged in: {}", record.summary.id);

    Ok(Json(AuthResponse {
        token,
        user: record.summary,
    }))
}
