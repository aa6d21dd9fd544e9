/**
 * Task Handlers
 *
 * Any member of the owning team may read and mutate tasks. Events go to the
 * parent project's room; deletes carry the full ancestry.
 */

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use crate::backend::error::BackendResult;
use crate::backend::middleware::AuthUser;
use crate::backend::routes::access::{project_for_member, task_for_member};
use crate::backend::server::state::AppState;
use crate::shared::error::require_non_empty;
use crate::shared::event::ServerEvent;
use crate::shared::ids::{ProjectId, TaskId};
use crate::shared::model::Task;
use crate::shared::requests::{NewTask, TaskPatch};

pub async fn list_project_tasks(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<ProjectId>,
) -> BackendResult<Json<Vec<Task>>> {
    project_for_member(state.directory.as_ref(), project_id, user).await?;
    Ok(Json(state.directory.tasks_for_project(project_id).await?))
}

pub async fn create_task(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(mut request): Json<NewTask>,
) -> BackendResult<(StatusCode, Json<Task>)> {
    request.title = require_non_empty("title", &request.title)?;
    project_for_member(state.directory.as_ref(), request.project_id, user).await?;
    let task = state.directory.create_task(request).await?;

    state
        .dispatcher
        .dispatch(&ServerEvent::TaskCreated { task: task.clone() })
        .await;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update_task(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(task_id): Path<TaskId>,
    Json(mut patch): Json<TaskPatch>,
) -> BackendResult<Json<Task>> {
    if let Some(title) = &patch.title {
        patch.title = Some(require_non_empty("title", title)?);
    }
    task_for_member(state.directory.as_ref(), task_id, user).await?;
    let task = state.directory.update_task(task_id, patch).await?;
    tracing::debug!("[Tasks] {} updated task {} ({:?})", user, task_id, task.status);

    state
        .dispatcher
        .dispatch(&ServerEvent::TaskUpdated { task: task.clone() })
        .await;
    Ok(Json(task))
}

pub async fn delete_task(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(task_id): Path<TaskId>,
) -> BackendResult<StatusCode> {
    let (_, project) = task_for_member(state.directory.as_ref(), task_id, user).await?;
    state.directory.delete_task(task_id).await?;

    state
        .dispatcher
        .dispatch(&ServerEvent::TaskDeleted {
            task_id,
            project_id: project.id,
            team_id: project.team_id,
        })
        .await;
    Ok(StatusCode::NO_CONTENT)
}
