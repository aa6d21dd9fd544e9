//! Persistence Collaborator
//!
//! The sync layer never talks to storage directly. Handlers persist through
//! the [`Directory`] trait and room authorization asks the narrower
//! [`Membership`] trait whether an identity currently belongs to an entity.
//!
//! # Module Structure
//!
//! ```text
//! store/
//! ├── mod.rs     - Directory and Membership traits
//! ├── error.rs   - StoreError
//! ├── memory.rs  - In-memory implementation for tests and ephemeral servers
//! ├── sqlite.rs  - SQLite implementation used by the server binary
//! └── schema.sql - SQLite tables
//! ```
//!
//! Cascades (team → projects → tasks) happen inside a single call so that a
//! mutation is one unit from the caller's perspective.

pub mod error;
pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::shared::ids::{ConversationId, ProjectId, TaskId, TeamId, UserId};
use crate::shared::model::{Conversation, Message, Project, Task, Team, UserSummary};
use crate::shared::requests::{NewTask, ProjectPatch, TaskPatch};

pub use error::{StoreError, StoreResult};
pub use memory::MemoryDirectory;
pub use sqlite::SqliteDirectory;

/// Stored user including the credential hash
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub summary: UserSummary,
    pub password_hash: String,
}

/// Result of deleting a team: the team as it was plus everything removed with it
#[derive(Debug, Clone)]
pub struct TeamRemoval {
    pub team: Team,
    pub projects: Vec<ProjectId>,
    pub tasks: usize,
}

/// Membership lookups used by room authorization
#[async_trait]
pub trait Membership: Send + Sync {
    async fn is_team_member(&self, team: TeamId, user: UserId) -> StoreResult<bool>;

    /// True when `user` belongs to the team that owns `project`
    async fn is_project_member(&self, project: ProjectId, user: UserId) -> StoreResult<bool>;

    async fn is_conversation_member(
        &self,
        conversation: ConversationId,
        user: UserId,
    ) -> StoreResult<bool>;
}

/// Storage operations behind the request/response channel
#[async_trait]
pub trait Directory: Membership {
    async fn create_user(&self, name: &str, email: &str, password_hash: &str) -> StoreResult<UserRecord>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>>;
    async fn user(&self, id: UserId) -> StoreResult<UserSummary>;
    async fn set_avatar(&self, id: UserId, avatar_url: Option<String>) -> StoreResult<UserSummary>;

    async fn create_team(&self, name: &str, creator: UserId) -> StoreResult<Team>;
    async fn teams_for_member(&self, user: UserId) -> StoreResult<Vec<Team>>;
    async fn team(&self, id: TeamId) -> StoreResult<Team>;
    async fn rename_team(&self, id: TeamId, name: &str) -> StoreResult<Team>;
    async fn add_member(&self, id: TeamId, user: UserId) -> StoreResult<Team>;
    async fn remove_member(&self, id: TeamId, user: UserId) -> StoreResult<Team>;
    async fn delete_team(&self, id: TeamId) -> StoreResult<TeamRemoval>;

    async fn create_project(&self, team: TeamId, name: &str, description: Option<String>) -> StoreResult<Project>;
    async fn projects_for_team(&self, team: TeamId) -> StoreResult<Vec<Project>>;
    async fn project(&self, id: ProjectId) -> StoreResult<Project>;
    async fn update_project(&self, id: ProjectId, patch: ProjectPatch) -> StoreResult<Project>;
    async fn delete_project(&self, id: ProjectId) -> StoreResult<Project>;

    async fn create_task(&self, task: NewTask) -> StoreResult<Task>;
    /// Newest first
    async fn tasks_for_project(&self, project: ProjectId) -> StoreResult<Vec<Task>>;
    async fn task(&self, id: TaskId) -> StoreResult<Task>;
    async fn update_task(&self, id: TaskId, patch: TaskPatch) -> StoreResult<Task>;
    async fn delete_task(&self, id: TaskId) -> StoreResult<Task>;

    /// The flag is true when the conversation did not exist before this call
    async fn find_or_create_conversation(&self, a: UserId, b: UserId) -> StoreResult<(Conversation, bool)>;
    /// Most recently active first
    async fn conversations_for_member(&self, user: UserId) -> StoreResult<Vec<Conversation>>;
    async fn conversation(&self, id: ConversationId) -> StoreResult<Conversation>;
    /// Appends a message and returns it with the updated conversation
    async fn append_message(
        &self,
        conversation: ConversationId,
        sender: UserId,
        content: &str,
    ) -> StoreResult<(Message, Conversation)>;
    /// Oldest first
    async fn messages(&self, conversation: ConversationId) -> StoreResult<Vec<Message>>;
}
