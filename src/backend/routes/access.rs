//! Membership and ownership checks shared by the REST handlers
//!
//! Each helper loads the entity (404 when it no longer exists) and then checks
//! the caller against the owning team or conversation (403 otherwise).

use crate::backend::error::{BackendError, BackendResult};
use crate::backend::store::Directory;
use crate::shared::ids::{ConversationId, ProjectId, TaskId, TeamId, UserId};
use crate::shared::model::{Conversation, Project, Task, Team};

pub async fn team_for_member(directory: &dyn Directory, team: TeamId, user: UserId) -> BackendResult<Team> {
    let team = directory.team(team).await?;
    if !team.has_member(user) {
        return Err(BackendError::denied("not a member of this team"));
    }
    Ok(team)
}

pub async fn team_for_creator(directory: &dyn Directory, team: TeamId, user: UserId) -> BackendResult<Team> {
    let team = directory.team(team).await?;
    if !team.is_creator(user) {
        return Err(BackendError::denied("only the team creator can do this"));
    }
    Ok(team)
}

pub async fn project_for_member(
    directory: &dyn Directory,
    project: ProjectId,
    user: UserId,
) -> BackendResult<(Project, Team)> {
    let project = directory.project(project).await?;
    let team = team_for_member(directory, project.team_id, user).await?;
    Ok((project, team))
}

pub async fn project_for_creator(
    directory: &dyn Directory,
    project: ProjectId,
    user: UserId,
) -> BackendResult<(Project, Team)> {
    let project = directory.project(project).await?;
    let team = team_for_creator(directory, project.team_id, user).await?;
    Ok((project, team))
}

pub async fn task_for_member(
    directory: &dyn Directory,
    task: TaskId,
    user: UserId,
) -> BackendResult<(Task, Project)> {
    let task = directory.task(task).await?;
    let (project, _) = project_for_member(directory, task.project_id, user).await?;
    Ok((task, project))
}

pub async fn conversation_for_member(
    directory: &dyn Directory,
    conversation: ConversationId,
    user: UserId,
) -> BackendResult<Conversation> {
    let conversation = directory.conversation(conversation).await?;
    if !conversation.has_member(user) {
        return Err(BackendError::denied("not a member of this conversation"));
    }
    Ok(conversation)
}
