//! Middleware Module
//!
//! Request processing shared by the REST handlers.
//!
//! - **`auth`** - `AuthUser` extractor that resolves the bearer token to a
//!   `UserId` and rejects with 401 before the handler runs

pub mod auth;

pub use auth::{bearer_token, AuthUser};
