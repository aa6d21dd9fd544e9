/**
 * Team Handlers
 *
 * Every mutation persists through the directory first and then dispatches.
 *
 * - `GET    /api/teams`                          - teams of the caller
 * - `POST   /api/teams`                          - create (caller becomes creator and sole member)
 * - `PATCH  /api/teams/{id}`                     - rename (creator)
 * - `POST   /api/teams/{id}/add`                 - add member by email (any member)
 * - `DELETE /api/teams/{id}/members/{member}`    - remove member (creator)
 * - `DELETE /api/teams/{id}`                     - delete with cascade (creator)
 */

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use crate::backend::error::{BackendError, BackendResult};
use crate::backend::middleware::AuthUser;
use crate::backend::routes::access::{team_for_creator, team_for_member};
use crate::backend::server::state::AppState;
use crate::shared::error::require_non_empty;
use crate::shared::event::ServerEvent;
use crate::shared::ids::{TeamId, UserId};
use crate::shared::model::Team;
use crate::shared::requests::{MemberInvite, TeamName};
use crate::shared::room::RoomRef;

pub async fn list_teams(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> BackendResult<Json<Vec<Team>>> {
    Ok(Json(state.directory.teams_for_member(user).await?))
}

pub async fn create_team(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(request): Json<TeamName>,
) -> BackendResult<(StatusCode, Json<Team>)> {
    let name = require_non_empty("name", &request.name)?;
    let team = state.directory.create_team(&name, user).await?;
    tracing::info!("[Teams] {} created team {}", user, team.id);

    state
        .dispatcher
        .dispatch(&ServerEvent::TeamCreated { team: team.clone() })
        .await;
    Ok((StatusCode::CREATED, Json(team)))
}

pub async fn rename_team(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(team_id): Path<TeamId>,
    Json(request): Json<TeamName>,
) -> BackendResult<Json<Team>> {
    let name = require_non_empty("name", &request.name)?;
    team_for_creator(state.directory.as_ref(), team_id, user).await?;
    let team = state.directory.rename_team(team_id, &name).await?;

    state
        .dispatcher
        .dispatch(&ServerEvent::TeamUpdated { team: team.clone() })
        .await;
    Ok(Json(team))
}

pub async fn add_member(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(team_id): Path<TeamId>,
    Json(request): Json<MemberInvite>,
) -> BackendResult<Json<Team>> {
    team_for_member(state.directory.as_ref(), team_id, user).await?;
    let member = state
        .directory
        .find_user_by_email(&request.email)
        .await?
        .ok_or_else(|| BackendError::not_found("user not found"))?
        .summary
        .id;

    let team = state.directory.add_member(team_id, member).await?;
    tracing::info!("[Teams] {} added {} to team {}", user, member, team_id);

    state
        .dispatcher
        .dispatch(&ServerEvent::MemberAdded { team: team.clone(), member })
        .await;
    Ok(Json(team))
}

pub async fn remove_member(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path((team_id, member)): Path<(TeamId, UserId)>,
) -> BackendResult<Json<Team>> {
    let team = team_for_creator(state.directory.as_ref(), team_id, user).await?;
    if team.is_creator(member) {
        return Err(BackendError::bad_request("the team creator cannot be removed"));
    }

    // The member keeps its user room but loses the team and its projects.
    // Resolved before the removal so nothing after the commit can fail.
    let mut rooms = vec![RoomRef::team(team_id)];
    rooms.extend(
        state
            .directory
            .projects_for_team(team_id)
            .await?
            .into_iter()
            .map(|project| RoomRef::project(project.id)),
    );

    let team = state.directory.remove_member(team_id, member).await?;
    tracing::info!("[Teams] {} removed {} from team {}", user, member, team_id);

    state
        .dispatcher
        .dispatch(&ServerEvent::MemberRemoved { team: team.clone(), member })
        .await;
    state.dispatcher.evict_user(member, &rooms).await;

    Ok(Json(team))
}

pub async fn delete_team(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(team_id): Path<TeamId>,
) -> BackendResult<StatusCode> {
    team_for_creator(state.directory.as_ref(), team_id, user).await?;
    let removal = state.directory.delete_team(team_id).await?;
    tracing::info!(
        "[Teams] {} deleted team {} ({} project(s), {} task(s))",
        user,
        team_id,
        removal.projects.len(),
        removal.tasks
    );

    state
        .dispatcher
        .dispatch(&ServerEvent::TeamDeleted { team_id })
        .await;

    let mut rooms = vec![RoomRef::team(team_id)];
    rooms.extend(removal.projects.iter().map(|project| RoomRef::project(*project)));
    state.dispatcher.close_rooms(&rooms).await;

    Ok(StatusCode::NO_CONTENT)
}
