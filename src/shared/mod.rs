//! Shared Module
//!
//! This module contains types and data structures that are shared between
//! the server and the sync client. These types are used for serialization on
//! both the request/response channel and the event channel.
//!
//! # Overview
//!
//! The shared module provides platform-agnostic types that can be used in
//! both server and client code. All types are designed for serialization and
//! transmission as JSON.

/// Typed entity identifiers
pub mod ids;

/// Entity shapes (teams, projects, tasks, conversations, messages)
pub mod model;

/// Typed room references
pub mod room;

/// Server-to-client event variants
pub mod event;

/// Event channel wire frames
pub mod protocol;

/// REST request and response bodies
pub mod requests;

/// Shared error types
pub mod error;

/// Application configuration
pub mod config;

pub use config::{AppConfig, AppConfigBuilder, ConfigError};
pub use error::SharedError;
pub use event::ServerEvent;
pub use ids::{ConversationId, MessageId, ProjectId, TaskId, TeamId, UserId};
pub use model::{Conversation, Message, Project, Task, TaskStatus, Team, UserSummary};
pub use protocol::{ClientFrame, ServerFrame};
pub use room::{RoomKind, RoomRef};
