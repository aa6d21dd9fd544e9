/**
 * Entity Shapes
 *
 * Canonical representations of the entities that travel over both the
 * request/response channel and the event channel. Events always carry the
 * full current representation of an entity, never a partial diff.
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::ids::{ConversationId, MessageId, ProjectId, TaskId, TeamId, UserId};

/// Public view of a user (never includes credentials)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// A team and its current member list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub members: Vec<UserSummary>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl Team {
    pub fn has_member(&self, user: UserId) -> bool {
        self.members.iter().any(|member| member.id == user)
    }

    pub fn member_ids(&self) -> Vec<UserId> {
        self.members.iter().map(|member| member.id).collect()
    }

    pub fn is_creator(&self, user: UserId) -> bool {
        self.created_by == user
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub team_id: TeamId,
    pub created_at: DateTime<Utc>,
}

/// Ordered stages a task moves through
///
/// The derived ordering follows declaration order: `Todo < Doing < Done`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Todo,
    Doing,
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Todo, TaskStatus::Doing, TaskStatus::Done];

    /// Column label shown on the board
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "To Do",
            TaskStatus::Doing => "In Progress",
            TaskStatus::Done => "Done",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: TaskStatus,
    pub project_id: ProjectId,
    #[serde(default)]
    pub assignees: Vec<UserId>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A single immutable chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender: UserSummary,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Two-member direct-message conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub members: Vec<UserSummary>,
    #[serde(default)]
    pub last_message: Option<Message>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn has_member(&self, user: UserId) -> bool {
        self.members.iter().any(|member| member.id == user)
    }

    /// The member that is not `me`, used for previews and notices
    pub fn counterpart(&self, me: UserId) -> Option<&UserSummary> {
        self.members.iter().find(|member| member.id != me)
    }
}
