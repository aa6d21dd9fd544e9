//! Room references
//!
//! A room is an ephemeral fan-out address derived from an entity reference.
//! Clients never send free-form room names; they send a typed `RoomRef` and
//! both sides compute the name with the same pure function.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::shared::ids::{ConversationId, ProjectId, TeamId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomKind {
    User,
    Team,
    Project,
    Conversation,
}

impl RoomKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomKind::User => "user",
            RoomKind::Team => "team",
            RoomKind::Project => "project",
            RoomKind::Conversation => "conversation",
        }
    }
}

/// Typed reference to a room: entity kind plus entity id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomRef {
    pub kind: RoomKind,
    pub id: Uuid,
}

impl RoomRef {
    pub fn user(id: UserId) -> Self {
        Self { kind: RoomKind::User, id: id.as_uuid() }
    }

    pub fn team(id: TeamId) -> Self {
        Self { kind: RoomKind::Team, id: id.as_uuid() }
    }

    pub fn project(id: ProjectId) -> Self {
        Self { kind: RoomKind::Project, id: id.as_uuid() }
    }

    pub fn conversation(id: ConversationId) -> Self {
        Self { kind: RoomKind::Conversation, id: id.as_uuid() }
    }

    /// Room name in `kind:id` form
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RoomRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}
