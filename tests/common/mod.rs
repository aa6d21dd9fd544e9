//! Common test utilities and helpers
//!
//! This module provides shared utilities for the integration tests:
//! - A real server bound to an ephemeral port
//! - Registered users with ready-made REST clients
//! - A raw websocket client speaking the frame protocol

pub mod server;
pub mod socket;

// Re-export commonly used utilities
pub use server::*;
pub use socket::*;
