/**
 * In-Memory Directory
 *
 * A `Directory` backed by hash maps behind a single `tokio::sync::RwLock`.
 * Rows store member ids only; teams and conversations are hydrated with the
 * current user summaries on every read so avatar changes show up everywhere.
 */
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::backend::store::{Directory, Membership, StoreError, StoreResult, TeamRemoval, UserRecord};
use crate::shared::error::require_non_empty;
use crate::shared::ids::{ConversationId, MessageId, ProjectId, TaskId, TeamId, UserId};
use crate::shared::model::{Conversation, Message, Project, Task, Team, UserSummary};
use crate::shared::requests::{NewTask, ProjectPatch, TaskPatch};

struct TeamRow {
    id: TeamId,
    name: String,
    member_ids: Vec<UserId>,
    created_by: UserId,
    created_at: DateTime<Utc>,
}

struct ConversationRow {
    id: ConversationId,
    member_ids: [UserId; 2],
    last_message: Option<Message>,
    updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, UserRecord>,
    emails: HashMap<String, UserId>,
    teams: HashMap<TeamId, TeamRow>,
    projects: HashMap<ProjectId, Project>,
    tasks: HashMap<TaskId, Task>,
    conversations: HashMap<ConversationId, ConversationRow>,
    messages: HashMap<ConversationId, Vec<Message>>,
}

impl Tables {
    fn summary(&self, id: UserId) -> StoreResult<UserSummary> {
        self.users
            .get(&id)
            .map(|record| record.summary.clone())
            .ok_or(StoreError::not_found("user"))
    }

    fn hydrate_team(&self, row: &TeamRow) -> Team {
        Team {
            id: row.id,
            name: row.name.clone(),
            members: row
                .member_ids
                .iter()
                .filter_map(|id| self.summary(*id).ok())
                .collect(),
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }

    fn hydrate_conversation(&self, row: &ConversationRow) -> Conversation {
        Conversation {
            id: row.id,
            members: row
                .member_ids
                .iter()
                .filter_map(|id| self.summary(*id).ok())
                .collect(),
            last_message: row.last_message.clone(),
            updated_at: row.updated_at,
        }
    }

    fn team_row(&self, id: TeamId) -> StoreResult<&TeamRow> {
        self.teams.get(&id).ok_or(StoreError::not_found("team"))
    }

    fn team_row_mut(&mut self, id: TeamId) -> StoreResult<&mut TeamRow> {
        self.teams.get_mut(&id).ok_or(StoreError::not_found("team"))
    }

    /// Removes every task of `project`, returning how many were removed
    fn drop_tasks_of(&mut self, project: ProjectId) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|_, task| task.project_id != project);
        before - self.tasks.len()
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Process-local directory for tests and servers run without a database
#[derive(Default)]
pub struct MemoryDirectory {
    tables: RwLock<Tables>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Membership for MemoryDirectory {
    async fn is_team_member(&self, team: TeamId, user: UserId) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .teams
            .get(&team)
            .map(|row| row.member_ids.contains(&user))
            .unwrap_or(false))
    }

    async fn is_project_member(&self, project: ProjectId, user: UserId) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        let Some(project) = tables.projects.get(&project) else {
            return Ok(false);
        };
        Ok(tables
            .teams
            .get(&project.team_id)
            .map(|row| row.member_ids.contains(&user))
            .unwrap_or(false))
    }

    async fn is_conversation_member(
        &self,
        conversation: ConversationId,
        user: UserId,
    ) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .conversations
            .get(&conversation)
            .map(|row| row.member_ids.contains(&user))
            .unwrap_or(false))
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn create_user(&self, name: &str, email: &str, password_hash: &str) -> StoreResult<UserRecord> {
        let email = normalize_email(email);
        let name = require_non_empty("name", name).map_err(|e| StoreError::invalid(e.to_string()))?;
        let mut tables = self.tables.write().await;
        if tables.emails.contains_key(&email) {
            return Err(StoreError::conflict("email already registered"));
        }
        let record = UserRecord {
            summary: UserSummary {
                id: UserId::new(),
                name,
                email: email.clone(),
                avatar_url: None,
            },
            password_hash: password_hash.to_string(),
        };
        tables.emails.insert(email, record.summary.id);
        tables.users.insert(record.summary.id, record.clone());
        Ok(record)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .emails
            .get(&normalize_email(email))
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn user(&self, id: UserId) -> StoreResult<UserSummary> {
        self.tables.read().await.summary(id)
    }

    async fn set_avatar(&self, id: UserId, avatar_url: Option<String>) -> StoreResult<UserSummary> {
        let mut tables = self.tables.write().await;
        let record = tables.users.get_mut(&id).ok_or(StoreError::not_found("user"))?;
        record.summary.avatar_url = avatar_url;
        Ok(record.summary.clone())
    }

    async fn create_team(&self, name: &str, creator: UserId) -> StoreResult<Team> {
        let name = require_non_empty("name", name).map_err(|e| StoreError::invalid(e.to_string()))?;
        let mut tables = self.tables.write().await;
        tables.summary(creator)?;
        let row = TeamRow {
            id: TeamId::new(),
            name,
            member_ids: vec![creator],
            created_by: creator,
            created_at: Utc::now(),
        };
        let team = tables.hydrate_team(&row);
        tables.teams.insert(row.id, row);
        Ok(team)
    }

    async fn teams_for_member(&self, user: UserId) -> StoreResult<Vec<Team>> {
        let tables = self.tables.read().await;
        let mut teams: Vec<Team> = tables
            .teams
            .values()
            .filter(|row| row.member_ids.contains(&user))
            .map(|row| tables.hydrate_team(row))
            .collect();
        teams.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(teams)
    }

    async fn team(&self, id: TeamId) -> StoreResult<Team> {
        let tables = self.tables.read().await;
        let row = tables.team_row(id)?;
        Ok(tables.hydrate_team(row))
    }

    async fn rename_team(&self, id: TeamId, name: &str) -> StoreResult<Team> {
        let name = require_non_empty("name", name).map_err(|e| StoreError::invalid(e.to_string()))?;
        let mut tables = self.tables.write().await;
        tables.team_row_mut(id)?.name = name;
        let row = tables.team_row(id)?;
        Ok(tables.hydrate_team(row))
    }

    async fn add_member(&self, id: TeamId, user: UserId) -> StoreResult<Team> {
        let mut tables = self.tables.write().await;
        tables.summary(user)?;
        let row = tables.team_row_mut(id)?;
        if row.member_ids.contains(&user) {
            return Err(StoreError::invalid("user is already a member of this team"));
        }
        row.member_ids.push(user);
        let row = tables.team_row(id)?;
        Ok(tables.hydrate_team(row))
    }

    async fn remove_member(&self, id: TeamId, user: UserId) -> StoreResult<Team> {
        let mut tables = self.tables.write().await;
        let row = tables.team_row_mut(id)?;
        let before = row.member_ids.len();
        row.member_ids.retain(|member| *member != user);
        if row.member_ids.len() == before {
            return Err(StoreError::not_found("member"));
        }
        let row = tables.team_row(id)?;
        Ok(tables.hydrate_team(row))
    }

    async fn delete_team(&self, id: TeamId) -> StoreResult<TeamRemoval> {
        let mut tables = self.tables.write().await;
        let team = {
            let row = tables.team_row(id)?;
            tables.hydrate_team(row)
        };
        tables.teams.remove(&id);
        let projects: Vec<ProjectId> = tables
            .projects
            .values()
            .filter(|project| project.team_id == id)
            .map(|project| project.id)
            .collect();
        let mut tasks = 0;
        for project in &projects {
            tables.projects.remove(project);
            tasks += tables.drop_tasks_of(*project);
        }
        Ok(TeamRemoval { team, projects, tasks })
    }

    async fn create_project(&self, team: TeamId, name: &str, description: Option<String>) -> StoreResult<Project> {
        let name = require_non_empty("name", name).map_err(|e| StoreError::invalid(e.to_string()))?;
        let mut tables = self.tables.write().await;
        tables.team_row(team)?;
        let project = Project {
            id: ProjectId::new(),
            name,
            description,
            team_id: team,
            created_at: Utc::now(),
        };
        tables.projects.insert(project.id, project.clone());
        Ok(project)
    }

    async fn projects_for_team(&self, team: TeamId) -> StoreResult<Vec<Project>> {
        let tables = self.tables.read().await;
        tables.team_row(team)?;
        let mut projects: Vec<Project> = tables
            .projects
            .values()
            .filter(|project| project.team_id == team)
            .cloned()
            .collect();
        projects.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(projects)
    }

    async fn project(&self, id: ProjectId) -> StoreResult<Project> {
        let tables = self.tables.read().await;
        tables.projects.get(&id).cloned().ok_or(StoreError::not_found("project"))
    }

    async fn update_project(&self, id: ProjectId, patch: ProjectPatch) -> StoreResult<Project> {
        let name = match patch.name.as_deref() {
            Some(name) => Some(require_non_empty("name", name).map_err(|e| StoreError::invalid(e.to_string()))?),
            None => None,
        };
        let mut tables = self.tables.write().await;
        let project = tables.projects.get_mut(&id).ok_or(StoreError::not_found("project"))?;
        if let Some(name) = name {
            project.name = name;
        }
        if let Some(description) = patch.description {
            project.description = Some(description);
        }
        Ok(project.clone())
    }

    async fn delete_project(&self, id: ProjectId) -> StoreResult<Project> {
        let mut tables = self.tables.write().await;
        let project = tables.projects.remove(&id).ok_or(StoreError::not_found("project"))?;
        tables.drop_tasks_of(id);
        Ok(project)
    }

    async fn create_task(&self, task: NewTask) -> StoreResult<Task> {
        let title = require_non_empty("title", &task.title).map_err(|e| StoreError::invalid(e.to_string()))?;
        let mut tables = self.tables.write().await;
        if !tables.projects.contains_key(&task.project_id) {
            return Err(StoreError::not_found("project"));
        }
        let task = Task {
            id: TaskId::new(),
            title,
            description: task.description,
            status: task.status,
            project_id: task.project_id,
            assignees: task.assignees,
            due_date: task.due_date,
            created_at: Utc::now(),
        };
        tables.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn tasks_for_project(&self, project: ProjectId) -> StoreResult<Vec<Task>> {
        let tables = self.tables.read().await;
        if !tables.projects.contains_key(&project) {
            return Err(StoreError::not_found("project"));
        }
        let mut tasks: Vec<Task> = tables
            .tasks
            .values()
            .filter(|task| task.project_id == project)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    async fn task(&self, id: TaskId) -> StoreResult<Task> {
        let tables = self.tables.read().await;
        tables.tasks.get(&id).cloned().ok_or(StoreError::not_found("task"))
    }

    async fn update_task(&self, id: TaskId, patch: TaskPatch) -> StoreResult<Task> {
        let title = match patch.title.as_deref() {
            Some(title) => Some(require_non_empty("title", title).map_err(|e| StoreError::invalid(e.to_string()))?),
            None => None,
        };
        let mut tables = self.tables.write().await;
        let task = tables.tasks.get_mut(&id).ok_or(StoreError::not_found("task"))?;
        if let Some(title) = title {
            task.title = title;
        }
        if let Some(description) = patch.description {
            task.description = Some(description);
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(assignees) = patch.assignees {
            task.assignees = assignees;
        }
        if let Some(due_date) = patch.due_date {
            task.due_date = Some(due_date);
        }
        Ok(task.clone())
    }

    async fn delete_task(&self, id: TaskId) -> StoreResult<Task> {
        let mut tables = self.tables.write().await;
        tables.tasks.remove(&id).ok_or(StoreError::not_found("task"))
    }

    async fn find_or_create_conversation(&self, a: UserId, b: UserId) -> StoreResult<(Conversation, bool)> {
        if a == b {
            return Err(StoreError::invalid("cannot start a conversation with yourself"));
        }
        let mut tables = self.tables.write().await;
        tables.summary(a)?;
        tables.summary(b)?;
        let existing = tables
            .conversations
            .values()
            .find(|row| row.member_ids.contains(&a) && row.member_ids.contains(&b))
            .map(|row| row.id);
        if let Some(id) = existing {
            if let Some(row) = tables.conversations.get(&id) {
                return Ok((tables.hydrate_conversation(row), false));
            }
        }
        let row = ConversationRow {
            id: ConversationId::new(),
            member_ids: [a, b],
            last_message: None,
            updated_at: Utc::now(),
        };
        let conversation = tables.hydrate_conversation(&row);
        tables.conversations.insert(row.id, row);
        Ok((conversation, true))
    }

    async fn conversations_for_member(&self, user: UserId) -> StoreResult<Vec<Conversation>> {
        let tables = self.tables.read().await;
        let mut conversations: Vec<Conversation> = tables
            .conversations
            .values()
            .filter(|row| row.member_ids.contains(&user))
            .map(|row| tables.hydrate_conversation(row))
            .collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(conversations)
    }

    async fn conversation(&self, id: ConversationId) -> StoreResult<Conversation> {
        let tables = self.tables.read().await;
        let row = tables
            .conversations
            .get(&id)
            .ok_or(StoreError::not_found("conversation"))?;
        Ok(tables.hydrate_conversation(row))
    }

    async fn append_message(
        &self,
        conversation: ConversationId,
        sender: UserId,
        content: &str,
    ) -> StoreResult<(Message, Conversation)> {
        let content = require_non_empty("content", content).map_err(|e| StoreError::invalid(e.to_string()))?;
        let mut tables = self.tables.write().await;
        let sender = tables.summary(sender)?;
        let message = Message {
            id: MessageId::new(),
            conversation_id: conversation,
            sender,
            content,
            created_at: Utc::now(),
        };
        let row = tables
            .conversations
            .get_mut(&conversation)
            .ok_or(StoreError::not_found("conversation"))?;
        row.last_message = Some(message.clone());
        row.updated_at = message.created_at;
        tables
            .messages
            .entry(conversation)
            .or_default()
            .push(message.clone());
        let row = tables
            .conversations
            .get(&conversation)
            .ok_or(StoreError::not_found("conversation"))?;
        Ok((message, tables.hydrate_conversation(row)))
    }

    async fn messages(&self, conversation: ConversationId) -> StoreResult<Vec<Message>> {
        let tables = self.tables.read().await;
        if !tables.conversations.contains_key(&conversation) {
            return Err(StoreError::not_found("conversation"));
        }
        Ok(tables.messages.get(&conversation).cloned().unwrap_or_default())
    }
}
