//! Route Configuration Module
//!
//! # Module Structure
//!
//! ```text
//! routes/
//! ├── mod.rs        - Module exports and documentation
//! ├── router.rs     - Router assembly, CORS, tracing, health
//! ├── api_routes.rs - REST route table
//! ├── access.rs     - Membership/creator checks
//! ├── teams.rs      - Team handlers
//! ├── projects.rs   - Project handlers
//! ├── tasks.rs      - Task handlers
//! ├── chat.rs       - Conversation and message handlers
//! └── users.rs      - Profile handlers
//! ```
//!
//! Every mutating handler persists through the directory and only then calls
//! the dispatcher. A dispatch never fails the request.

pub mod access;
pub mod api_routes;
pub mod chat;
pub mod projects;
pub mod router;
pub mod tasks;
pub mod teams;
pub mod users;

pub use router::create_router;
