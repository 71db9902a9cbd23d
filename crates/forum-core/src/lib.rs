//! forum-core - Core library for the anonymous forum
//!
//! This crate holds everything below the HTTP layer:
//!
//! - **auth**: Session token generation and hashing
//! - **db**: SQLite storage for sessions, posts and comments
//! - **ports**: Storage and collaborator traits the services depend on
//! - **service**: Session lifecycle, posts, and comment submission
//! - **client**: HTTP identity provider and image store (feature `client`)

pub mod auth;
pub mod clock;
pub mod db;
pub mod error;
pub mod ports;
pub mod service;
pub mod types;

#[cfg(feature = "client")]
pub mod client;

// Re-export commonly used types
pub use auth::{SessionToken, TokenHash};
pub use clock::{Clock, ManualClock, SystemClock};
pub use db::Database;
pub use error::{Error, ErrorKind, Result};
