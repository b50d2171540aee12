//! Error types for the aoc-runner authentication layer.
//!
//! All errors are strongly typed and propagated without panicking.
//! Session credentials are never included in error messages beyond
//! their last four characters.

use std::fmt;
use std::path::PathBuf;

/// Authentication error types covering all registry and resolver operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("The auth token ...{suffix} is dead (status {status})")]
    DeadCredential { suffix: String, status: u16 },

    #[error("Unknown login source of {0}")]
    UnknownSource(String),

    #[error("User {0} already exists")]
    AlreadyExists(String),

    #[error("No user found: {0}")]
    NotFound(String),

    #[error("Tokens file {} was modified since it was last read", .0.display())]
    ConcurrentModification(PathBuf),

    #[error("Unexpected settings page: {0}")]
    UnexpectedResponse(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid file format: {0}")]
    InvalidFileFormat(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single field that failed record validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Persisted field name (`aoc_id`, `login_source`, ...).
    pub field: &'static str,
    /// Human-readable reason.
    pub reason: String,
}

/// Record validation failure listing every offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    /// Names of the offending fields, in the order they were checked.
    pub fn fields(&self) -> Vec<&'static str> {
        self.errors.iter().map(|e| e.field).collect()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation error(s):", self.errors.len())?;
        for e in &self.errors {
            write!(f, " {}: {};", e.field, e.reason)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        AuthError::Transport(e.to_string())
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Return the diagnostic form of a credential: its last four characters.
pub fn mask_credential(credential: &str) -> String {
    let chars: Vec<char> = credential.chars().collect();
    let start = chars.len().saturating_sub(4);
    chars[start..].iter().collect()
}
