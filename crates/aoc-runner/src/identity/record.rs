//! Identity record: one known user and their session credential.
//!
//! A record is keyed by `{login_source}.{aoc_id}`. The credential is
//! treated as opaque and never printed in full.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{mask_credential, FieldError, ValidationError};

/// Login providers a record may originate from.
pub const LOGIN_SOURCES: [&str; 4] = ["github", "google", "twitter", "reddit"];

/// Placeholder used when the settings page does not reveal a provider.
pub const UNKNOWN: &str = "unknown";

/// A user known to the registry.
///
/// Fields are public so callers can build records by hand; anything that
/// enters a registry is validated again on the way in.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRecord")]
pub struct IdentityRecord {
    /// Human-readable name, may be `unknown`.
    #[serde(rename = "user_name")]
    pub display_name: String,
    /// Numeric site id, always > 0.
    #[serde(rename = "aoc_id")]
    pub identity_id: i64,
    /// Login provider, one of [`LOGIN_SOURCES`].
    #[serde(rename = "login_source")]
    pub source: String,
    /// Set on creation and every credential change.
    #[serde(with = "crate::time::iso8601")]
    pub last_updated: NaiveDateTime,
    /// Session cookie value.
    #[serde(rename = "token")]
    pub credential: String,
}

/// Unvalidated wire form, funnelled through [`IdentityRecord::new`].
#[derive(Deserialize)]
struct RawRecord {
    user_name: String,
    aoc_id: i64,
    login_source: String,
    #[serde(with = "crate::time::iso8601")]
    last_updated: NaiveDateTime,
    token: String,
}

impl TryFrom<RawRecord> for IdentityRecord {
    type Error = ValidationError;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        IdentityRecord::new(
            raw.user_name,
            raw.aoc_id,
            raw.login_source,
            raw.last_updated,
            raw.token,
        )
    }
}

impl IdentityRecord {
    /// Build a record, checking every field constraint.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` naming each offending field.
    pub fn new(
        display_name: impl Into<String>,
        identity_id: i64,
        source: impl Into<String>,
        last_updated: NaiveDateTime,
        credential: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let record = Self {
            display_name: display_name.into(),
            identity_id,
            source: source.into(),
            last_updated,
            credential: credential.into(),
        };
        record.validate()?;
        Ok(record)
    }

    /// Re-check the field constraints of an existing record.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = Vec::new();
        if self.identity_id <= 0 {
            errors.push(FieldError {
                field: "aoc_id",
                reason: format!("must be greater than 0, got {}", self.identity_id),
            });
        }
        if !is_login_source(&self.source) {
            errors.push(FieldError {
                field: "login_source",
                reason: format!("source {:?} is not defined", self.source),
            });
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { errors })
        }
    }

    /// Registry key, `{source}.{aoc_id}`.
    pub fn key(&self) -> String {
        format!("{}.{}", self.source, self.identity_id)
    }

    /// Replace the credential and advance `last_updated`.
    ///
    /// The timestamp never moves backwards, even if the wall clock does.
    pub fn set_credential(&mut self, credential: impl Into<String>) {
        self.credential = credential.into();
        self.touch();
    }

    /// Advance `last_updated` to now, keeping it monotonic.
    pub fn touch(&mut self) {
        let now = crate::time::now();
        if now > self.last_updated {
            self.last_updated = now;
        }
    }

    /// Per-user cache directory under `users_dir`.
    pub fn cache_dir(&self, users_dir: &Path) -> PathBuf {
        users_dir.join(self.key())
    }

    /// Last four characters of the credential, for diagnostics.
    pub fn masked_credential(&self) -> String {
        mask_credential(&self.credential)
    }
}

/// Case-sensitive allow-list membership.
pub fn is_login_source(source: &str) -> bool {
    LOGIN_SOURCES.contains(&source)
}

impl fmt::Debug for IdentityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityRecord")
            .field("display_name", &self.display_name)
            .field("identity_id", &self.identity_id)
            .field("source", &self.source)
            .field("last_updated", &self.last_updated)
            .field("credential", &format_args!("...{}", self.masked_credential()))
            .finish()
    }
}
