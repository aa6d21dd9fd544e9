//! `PATCH /api/users/{id}/avatar`

use axum::{
    extract::{Path, State},
    response::Json,
};

use crate::backend::error::{BackendError, BackendResult};
use crate::backend::middleware::AuthUser;
use crate::backend::server::state::AppState;
use crate::shared::ids::UserId;
use crate::shared::model::UserSummary;
use crate::shared::requests::AvatarUpdate;

pub async fn update_avatar(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(target): Path<UserId>,
    Json(request): Json<AvatarUpdate>,
) -> BackendResult<Json<UserSummary>> {
    if target != user {
        return Err(BackendError::denied("cannot change another user's avatar"));
    }
    let avatar_url = request
        .avatar_url
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty());
    Ok(Json(state.directory.set_avatar(user, avatar_url).await?))
}
