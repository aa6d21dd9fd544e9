//! Authentication Module
//!
//! This module handles registration, login and session tokens.
//!
//! # Module Structure
//!
//! ```text
//! auth/
//! ├── mod.rs          - Module exports and documentation
//! ├── password.rs     - bcrypt hashing off the async runtime
//! ├── sessions.rs     - JWT token management
//! └── handlers/       - HTTP handlers
//!     ├── mod.rs      - Handler exports
//!     ├── register.rs - User registration handler
//!     ├── login.rs    - User authentication handler
//!     └── me.rs       - Get current user handler
//! ```
//!
//! # Authentication Flow
//!
//! 1. **Register**: name, email and password → user created → JWT returned
//! 2. **Login**: email and password → credentials verified → JWT returned
//! 3. **Event channel**: the same JWT is presented at websocket handshake,
//!    either as `?token=` or as a bearer header
//!
//! # Security
//!
//! - Passwords are hashed using bcrypt before storage
//! - Invalid credentials return 401 (no information leakage)

/// Password hashing
pub mod password;

/// JWT token generation and validation
pub mod sessions;

/// HTTP handlers for authentication endpoints
pub mod handlers;

pub use handlers::{login, me, register};
pub use sessions::{Claims, TokenIssuer};
