//! Request/response bodies for the REST channel
//!
//! The server deserializes these and the client serializes them, so both
//! sides agree on one definition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::ids::{ConversationId, ProjectId, TeamId, UserId};
use crate::shared::model::{TaskStatus, UserSummary};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Returned by register and login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserSummary,
}

/// Create or rename a team
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamName {
    pub name: String,
}

/// Add a member by email
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberInvite {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProject {
    pub team_id: TeamId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    pub project_id: ProjectId,
    #[serde(default)]
    pub assignees: Vec<UserId>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignees: Option<Vec<UserId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Find or create a conversation with the user owning `email`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartConversation {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub conversation_id: ConversationId,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarUpdate {
    pub avatar_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_patch_only_sends_status() {
        let patch = TaskPatch::status(TaskStatus::Done);
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({"status": "done"}));
    }

    #[test]
    fn test_new_task_defaults() {
        let raw = serde_json::json!({"title": "Write docs", "project_id": ProjectId::new()});
        let task: NewTask = serde_json::from_value(raw).unwrap();
        assert_eq!(task.status, TaskStatus::Todo);
        assert!(task.assignees.is_empty());
    }
}
