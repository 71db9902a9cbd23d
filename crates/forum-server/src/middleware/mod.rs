//! Middleware for forum-server.

pub mod session;

pub use session::{ensure_token, require_valid_session, CurrentSession, SESSION_COOKIE};
