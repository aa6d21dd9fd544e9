// Increase recursion limit for complex async operations
#![recursion_limit = "256"]

//! TeamSync - Main Library
//!
//! TeamSync is the real-time synchronization layer of a team collaboration
//! application: teams, projects, task boards and direct messages, kept live
//! across every connected client.
//!
//! # Module Structure
//!
//! - **`shared`** - Types shared between server and client
//!   - Typed ids, entity shapes, room references
//!   - The closed set of server events and the websocket frames
//!   - Error and configuration types
//!
//! - **`backend`** - Server-side code (only compiled with `ssr` feature)
//!   - Axum REST handlers that persist and then dispatch events
//!   - Room topology, fan-out dispatcher and websocket sessions
//!   - JWT authentication
//!
//! - **`client`** - Sync client (native targets)
//!   - Reconciliation engine and keyed caches
//!   - Unread tracking with durable storage
//!   - Optimistic task updates, REST client, reconnecting transport
//!
//! # Feature Flags
//!
//! - **`ssr`** - enables the backend modules and the `teamsync-server` binary
//!
//! # Usage
//!
//! ## Server-Side
//!
//! ```rust,no_run
//! use teamsync::backend::{create_app, ServerConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let app = create_app(ServerConfig::default()).await?;
//! // Serve `app` with axum::serve
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! - `shared::SharedError` for validation and serialization
//! - `backend::BackendError`, rendered as JSON error responses
//! - `client::ClientError` for everything the sync client surfaces

/// Shared types and data structures
pub mod shared;

/// Backend server-side code
#[cfg(feature = "ssr")]
pub mod backend;

/// Sync client
/// Only compiled for native targets (not WASM)
#[cfg(not(target_arch = "wasm32"))]
pub mod client;
