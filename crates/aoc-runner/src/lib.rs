//! aoc-runner: session credential management for an Advent of Code client.
//!
//! Discovers the user's session token, resolves it to an identity by
//! reading the account settings page, and keeps a registry of known users
//! with one designated default in `tokens.json`.

pub mod config;
pub mod error;
pub mod identity;
pub mod resolver;
pub mod storage;
pub mod time;

// Re-export primary types
pub use config::Config;
pub use error::{AuthError, FieldError, Result, ValidationError};
pub use identity::{IdentityRecord, LOGIN_SOURCES};
pub use resolver::{HttpClient, HttpResponse, IdentityResolver, Transport};
pub use storage::{Registry, TokensFile};
