/**
 * Real-time Event System
 *
 * This module defines the closed set of server-to-client events. There is
 * exactly one variant per kind of mutation the server fans out, and every
 * variant carries the full current representation of the affected entity.
 * Delete events carry the removed id plus every ancestor id the client needs
 * to prune its caches, since the entity itself can no longer be looked up.
 */
use serde::{Deserialize, Serialize};

use crate::shared::ids::{ProjectId, TaskId, TeamId, UserId};
use crate::shared::model::{Conversation, Message, Project, Task, Team};

/// Event pushed from the server to every session joined to a target room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServerEvent {
    TeamCreated {
        team: Team,
    },
    /// Team renamed or otherwise changed without a membership change
    TeamUpdated {
        team: Team,
    },
    MemberAdded {
        team: Team,
        member: UserId,
    },
    MemberRemoved {
        team: Team,
        member: UserId,
    },
    TeamDeleted {
        team_id: TeamId,
    },
    ProjectCreated {
        project: Project,
    },
    ProjectUpdated {
        project: Project,
    },
    ProjectDeleted {
        project_id: ProjectId,
        team_id: TeamId,
    },
    TaskCreated {
        task: Task,
    },
    TaskUpdated {
        task: Task,
    },
    TaskDeleted {
        task_id: TaskId,
        project_id: ProjectId,
        team_id: TeamId,
    },
    /// A new message plus the conversation as it looks after the message
    MessageSent {
        message: Message,
        conversation: Conversation,
    },
}

impl ServerEvent {
    /// Wire name of the variant, used for logging
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::TeamCreated { .. } => "team_created",
            ServerEvent::TeamUpdated { .. } => "team_updated",
            ServerEvent::MemberAdded { .. } => "member_added",
            ServerEvent::MemberRemoved { .. } => "member_removed",
            ServerEvent::TeamDeleted { .. } => "team_deleted",
            ServerEvent::ProjectCreated { .. } => "project_created",
            ServerEvent::ProjectUpdated { .. } => "project_updated",
            ServerEvent::ProjectDeleted { .. } => "project_deleted",
            ServerEvent::TaskCreated { .. } => "task_created",
            ServerEvent::TaskUpdated { .. } => "task_updated",
            ServerEvent::TaskDeleted { .. } => "task_deleted",
            ServerEvent::MessageSent { .. } => "message_sent",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::ids::ConversationId;
    use chrono::Utc;

    #[test]
    fn test_event_is_tagged_by_kind() {
        let team_id = TeamId::new();
        let event = ServerEvent::TeamDeleted { team_id };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "team_deleted");
        assert_eq!(json["team_id"], team_id.to_string());
        assert_eq!(event.name(), "team_deleted");
    }

    #[test]
    fn test_task_deleted_carries_ancestry() {
        let raw = serde_json::json!({
            "kind": "task_deleted",
            "task_id": TaskId::new(),
            "project_id": ProjectId::new(),
            "team_id": TeamId::new(),
        });
        let event: ServerEvent = serde_json::from_value(raw).unwrap();
        assert!(matches!(event, ServerEvent::TaskDeleted { .. }));
    }

    #[test]
    fn test_task_deleted_without_team_is_rejected() {
        let raw = serde_json::json!({
            "kind": "task_deleted",
            "task_id": TaskId::new(),
            "project_id": ProjectId::new(),
        });
        assert!(serde_json::from_value::<ServerEvent>(raw).is_err());
    }

    #[test]
    fn test_message_event_decodes_full_payload() {
        let sender = crate::shared::model::UserSummary {
            id: UserId::new(),
            name: "x".to_string(),
            email: "x@example.com".to_string(),
            avatar_url: None,
        };
        let conversation_id = ConversationId::new();
        let message = Message {
            id: crate::shared::ids::MessageId::new(),
            conversation_id,
            sender: sender.clone(),
            content: "hello".to_string(),
            created_at: Utc::now(),
        };
        let event = ServerEvent::MessageSent {
            conversation: Conversation {
                id: conversation_id,
                members: vec![sender],
                last_message: Some(message.clone()),
                updated_at: message.created_at,
            },
            message,
        };
        let text = serde_json::to_string(&event).unwrap();
        let decoded: ServerEvent = serde_json::from_str(&text).unwrap();
        assert_eq!(decoded, event);
    }
}
