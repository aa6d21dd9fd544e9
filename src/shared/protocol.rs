//! Event channel wire frames
//!
//! Both directions exchange JSON text frames tagged by `type`.

use serde::{Deserialize, Serialize};

use crate::shared::error::SharedError;
use crate::shared::event::ServerEvent;
use crate::shared::room::RoomRef;

/// Client to server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    JoinRoom { room: RoomRef },
    LeaveRoom { room: RoomRef },
}

/// Server to client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Event { event: ServerEvent },
    Joined { room: RoomRef },
    Left { room: RoomRef },
    /// Informational only; a denied join changes nothing
    Denied { room: RoomRef },
    Error { message: String },
}

impl ClientFrame {
    pub fn parse(text: &str) -> Result<Self, SharedError> {
        serde_json::from_str(text).map_err(|e| SharedError::protocol(format!("invalid client frame: {}", e)))
    }
}

impl ServerFrame {
    pub fn event(event: ServerEvent) -> Self {
        ServerFrame::Event { event }
    }

    pub fn parse(text: &str) -> Result<Self, SharedError> {
        serde_json::from_str(text).map_err(|e| SharedError::protocol(format!("invalid server frame: {}", e)))
    }
}
