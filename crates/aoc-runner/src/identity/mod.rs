//! Identity records: the resolved owner of a session credential.
//!
//! The identity module provides the validated [`IdentityRecord`] type,
//! keyed by `{source}.{aoc_id}`.

pub mod record;

pub use record::{is_login_source, IdentityRecord, LOGIN_SOURCES, UNKNOWN};
