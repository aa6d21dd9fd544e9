//! Backend Module
//!
//! Server side of teamsync: an axum HTTP server exposing the REST channel
//! and the websocket event channel.
//!
//! This module is only compiled when the `ssr` feature is enabled.
//!
//! # Module Structure
//!
//! ```text
//! backend/
//! ├── mod.rs      - Module exports and documentation
//! ├── server/     - Configuration, state, app creation
//! ├── routes/     - Router and REST handlers
//! ├── realtime/   - Room topology, dispatcher, websocket sessions
//! ├── auth/       - Registration, login, JWT, password hashing
//! ├── middleware/ - AuthUser extractor
//! ├── store/      - Directory trait, SQLite and in-memory implementations
//! └── error/      - BackendError and its HTTP conversion
//! ```
//!
//! # Request Flow
//!
//! A mutating request is authenticated by `AuthUser`, authorized against the
//! directory, persisted, and then handed to the `Dispatcher`, which computes
//! the target rooms and pushes the event to every joined session. Delivery
//! problems are logged and never fail the request.

/// Server setup and configuration
pub mod server;

/// Route configuration
pub mod routes;

/// Rooms, fan-out and websocket sessions
pub mod realtime;

/// Backend error types
pub mod error;

/// Authentication and user management
pub mod auth;

/// Middleware for request processing
pub mod middleware;

/// Persistence collaborator
pub mod store;

pub use error::BackendError;
pub use realtime::{Dispatcher, RoomTopology};
pub use server::{create_app, AppState, ServerConfig};
