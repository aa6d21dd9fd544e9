//! GET /api/auth/me

use axum::{extract::State, response::Json};
use std::sync::Arc;

use crate::backend::error::BackendResult;
use crate::backend::middleware::AuthUser;
use crate::backend::store::Directory;
use crate::shared::model::UserSummary;

pub async fn me(
    AuthUser(user): AuthUser,
    State(directory): State<Arc<dyn Directory>>,
) -> BackendResult<Json<UserSummary>> {
    Ok(Json(directory.user(user).await?))
}
