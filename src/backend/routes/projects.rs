/**
 * Project Handlers
 *
 * Reads require team membership; mutations are reserved to the team creator.
 * Every project event goes to the parent team's room.
 */

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use crate::backend::error::BackendResult;
use crate::backend::middleware::AuthUser;
use crate::backend::routes::access::{project_for_creator, team_for_creator, team_for_member};
use crate::backend::server::state::AppState;
use crate::shared::error::require_non_empty;
use crate::shared::event::ServerEvent;
use crate::shared::ids::{ProjectId, TeamId};
use crate::shared::model::Project;
use crate::shared::requests::{NewProject, ProjectPatch};
use crate::shared::room::RoomRef;

pub async fn list_team_projects(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(team_id): Path<TeamId>,
) -> BackendResult<Json<Vec<Project>>> {
    team_for_member(state.directory.as_ref(), team_id, user).await?;
    Ok(Json(state.directory.projects_for_team(team_id).await?))
}

pub async fn create_project(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(request): Json<NewProject>,
) -> BackendResult<(StatusCode, Json<Project>)> {
    let name = require_non_empty("name", &request.name)?;
    team_for_creator(state.directory.as_ref(), request.team_id, user).await?;
    let project = state
        .directory
        .create_project(request.team_id, &name, request.description)
        .await?;

    state
        .dispatcher
        .dispatch(&ServerEvent::ProjectCreated { project: project.clone() })
        .await;
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn update_project(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<ProjectId>,
    Json(mut patch): Json<ProjectPatch>,
) -> BackendResult<Json<Project>> {
    if let Some(name) = &patch.name {
        patch.name = Some(require_non_empty("name", name)?);
    }
    project_for_creator(state.directory.as_ref(), project_id, user).await?;
    let project = state.directory.update_project(project_id, patch).await?;

    state
        .dispatcher
        .dispatch(&ServerEvent::ProjectUpdated { project: project.clone() })
        .await;
    Ok(Json(project))
}

pub async fn delete_project(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<ProjectId>,
) -> BackendResult<StatusCode> {
    project_for_creator(state.directory.as_ref(), project_id, user).await?;
    let project = state.directory.delete_project(project_id).await?;

    state
        .dispatcher
        .dispatch(&ServerEvent::ProjectDeleted {
            project_id,
            team_id: project.team_id,
        })
        .await;
    state.dispatcher.close_rooms(&[RoomRef::project(project_id)]).await;

    Ok(StatusCode::NO_CONTENT)
}
