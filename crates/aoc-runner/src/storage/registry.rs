//! User registry: the persisted set of known identities.
//!
//! The registry lives in `{auth_dir}/tokens.json`:
//! ```json
//! {
//!   "default_user": "github.2129276",
//!   "users": [
//!     {
//!       "user_name": "mdrotthoff",
//!       "aoc_id": 2129276,
//!       "login_source": "github",
//!       "last_updated": "2024-01-16T10:12:22.760942",
//!       "token": "53616c74..."
//!     }
//!   ]
//! }
//! ```
//!
//! Every mutation that changes durable state saves immediately. Before
//! writing, the file's modification time is compared with the one seen at
//! the last load or save; a mismatch means another process wrote the file
//! and the save is refused with `AuthError::ConcurrentModification`.
//!
//! Timestamps are only as fine as the filesystem records them, so a foreign
//! write in the same tick as our own save goes unnoticed.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{mask_credential, AuthError, Result};
use crate::identity::{is_login_source, IdentityRecord};
use crate::resolver::{IdentityResolver, Transport};

// ── On-disk structure ─────────────────────────────────────────────────────────

/// Top-level structure of `tokens.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokensFile {
    /// Key of the default user, if any.
    pub default_user: Option<String>,
    /// Known users in insertion order.
    pub users: Vec<IdentityRecord>,
}

#[derive(Serialize)]
struct TokensFileRef<'a> {
    default_user: Option<&'a str>,
    users: &'a [IdentityRecord],
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// In-memory view of `tokens.json` plus the resolver used to identify
/// new credentials.
///
/// Not shared across threads; embedders that need that must serialize
/// access themselves.
pub struct Registry<T> {
    records: Vec<IdentityRecord>,
    default_key: Option<String>,
    tokens_file: PathBuf,
    credential_file: PathBuf,
    session_override: Option<String>,
    last_read_mtime: Option<SystemTime>,
    resolver: IdentityResolver<T>,
}

impl<T: Transport> Registry<T> {
    /// Open the registry for `config`.
    ///
    /// Loads `tokens.json`, imports the default credential (environment
    /// override first, then the one-shot `token` file), saves, and deletes
    /// the `token` file if it was the credential's source.
    ///
    /// # Errors
    ///
    /// Propagates load, resolve and save failures.
    pub fn open(config: &Config, resolver: IdentityResolver<T>) -> Result<Self> {
        let mut registry = Self::load(config, resolver)?;
        let consumed_file = registry.resolve_default()?;
        registry.save()?;

        if consumed_file && registry.credential_file.exists() {
            std::fs::remove_file(&registry.credential_file)?;
            debug!(
                "Removed default token file {}",
                registry.credential_file.display()
            );
        }
        debug!("Registry at {} initialized", registry.tokens_file.display());
        Ok(registry)
    }

    /// Load `tokens.json` without importing a default credential or saving.
    ///
    /// A missing file yields an empty registry.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidFileFormat` if the file does not parse or
    /// holds an invalid record, or `AuthError::Io` for filesystem errors.
    pub fn load(config: &Config, resolver: IdentityResolver<T>) -> Result<Self> {
        let mut registry = Self {
            records: Vec::new(),
            default_key: None,
            tokens_file: config.tokens_file(),
            credential_file: config.credential_file(),
            session_override: config.session_override.clone(),
            last_read_mtime: None,
            resolver,
        };

        if !registry.tokens_file.exists() {
            debug!("User list not found at {}", registry.tokens_file.display());
            return Ok(registry);
        }

        // Stat before read: a write racing the read must surface as a conflict.
        let mtime = file_mtime(&registry.tokens_file)?;
        let bytes = std::fs::read(&registry.tokens_file)?;
        let state: TokensFile = serde_json::from_slice(&bytes).map_err(|e| {
            AuthError::InvalidFileFormat(format!(
                "failed to parse {}: {e}",
                registry.tokens_file.display()
            ))
        })?;

        for record in state.users {
            registry.upsert(record);
        }
        registry.default_key = match state.default_user {
            Some(key) if registry.position(&key).is_none() => {
                warn!("Default user {key} is not in the user list, clearing it");
                None
            }
            other => other,
        };
        registry.last_read_mtime = mtime;

        debug!("Loaded user list from {}", registry.tokens_file.display());
        Ok(registry)
    }

    /// Import the default credential, if one is configured.
    ///
    /// Returns `true` when the credential came from the one-shot file.
    fn resolve_default(&mut self) -> Result<bool> {
        let (token, from_file) = match self.session_override.clone() {
            Some(token) => {
                debug!("Token loaded from environment variable");
                (token, false)
            }
            None => match read_credential_file(&self.credential_file)? {
                Some(token) => {
                    debug!("Token loaded from default token file");
                    (token, true)
                }
                None => {
                    info!("No default token found");
                    return Ok(false);
                }
            },
        };

        let key = match self.owner_of(&token) {
            Some(key) => key,
            None => {
                let record = self.resolver.resolve(&token)?;
                let key = record.key();
                match self.position(&key) {
                    Some(idx) => {
                        debug!(
                            "Updated token for existing user {key} to ...{}",
                            mask_credential(&token)
                        );
                        self.records[idx].set_credential(token);
                    }
                    None => {
                        debug!(
                            "Adding new user {key} to {}",
                            self.tokens_file.display()
                        );
                        self.records.push(record);
                    }
                }
                key
            }
        };

        debug!("Default user set to {key}");
        self.default_key = Some(key);
        Ok(from_file)
    }

    /// Write the registry to `tokens.json`.
    ///
    /// The file is written atomically and only if nobody else modified it
    /// since it was last read or written by this registry.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::ConcurrentModification` if the file changed
    /// underneath us, `AuthError::SerializationError` if encoding fails, or
    /// `AuthError::Io` for filesystem errors.
    pub fn save(&mut self) -> Result<()> {
        if let Some(current) = file_mtime(&self.tokens_file)? {
            if self.last_read_mtime != Some(current) {
                error!(
                    "Tokens file {} was modified since it was last read",
                    self.tokens_file.display()
                );
                return Err(AuthError::ConcurrentModification(self.tokens_file.clone()));
            }
        }

        let state = TokensFileRef {
            default_user: self.default_key.as_deref(),
            users: &self.records,
        };
        let json = serde_json::to_string_pretty(&state)
            .map_err(|e| AuthError::SerializationError(e.to_string()))?;

        write_atomic(&self.tokens_file, json.as_bytes())?;
        self.last_read_mtime = file_mtime(&self.tokens_file)?;

        debug!(
            "Token file {} was successfully saved",
            self.tokens_file.display()
        );
        Ok(())
    }

    // ── Mutations ─────────────────────────────────────────────────────────────

    /// Resolve `credential` and add its owner.
    ///
    /// Re-adding a credential already stored for its owner does nothing.
    /// A different credential for an existing owner is refused unless
    /// `force` is set, in which case it replaces the stored one.
    ///
    /// # Errors
    ///
    /// Returns resolver errors, `AuthError::AlreadyExists` on a conflicting
    /// credential without `force`, or save errors.
    pub fn add_credential(&mut self, credential: &str, force: bool) -> Result<()> {
        let record = self.resolver.resolve(credential)?;
        let key = record.key();

        match self.position(&key) {
            Some(idx) if self.records[idx].credential == credential => {
                debug!(
                    "User {key} with token ...{} already exists in {}",
                    mask_credential(credential),
                    self.tokens_file.display()
                );
                return Ok(());
            }
            Some(_) if !force => {
                error!(
                    "User {key} with a different token already exists in {}",
                    self.tokens_file.display()
                );
                return Err(AuthError::AlreadyExists(key));
            }
            Some(idx) => {
                let existing = &mut self.records[idx];
                existing.display_name = record.display_name;
                existing.set_credential(credential);
            }
            None => self.records.push(record),
        }
        debug!(
            "User {key} with token ...{} added to {}",
            mask_credential(credential),
            self.tokens_file.display()
        );

        self.default_if_unset(&key);
        self.save()
    }

    /// Add a pre-resolved record.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnknownSource` if the login source is not
    /// recognised, `AuthError::Validation` for other invalid fields,
    /// `AuthError::AlreadyExists` if the key is taken and `force` is not set,
    /// or save errors.
    pub fn add_record(&mut self, mut record: IdentityRecord, force: bool) -> Result<()> {
        let source = record.source.to_lowercase();
        if !is_login_source(&source) {
            error!("Unknown login source {}", record.source);
            return Err(AuthError::UnknownSource(record.source));
        }
        record.source = source;
        record.validate()?;

        let key = record.key();
        match self.position(&key) {
            Some(_) if !force => {
                error!(
                    "User {key} already exists in {}",
                    self.tokens_file.display()
                );
                return Err(AuthError::AlreadyExists(key));
            }
            Some(idx) => {
                let previous = self.records[idx].last_updated;
                record.last_updated = record.last_updated.max(previous);
                self.records[idx] = record;
            }
            None => self.records.push(record),
        }
        debug!("User {key} added to {}", self.tokens_file.display());

        self.default_if_unset(&key);
        self.save()
    }

    /// Remove a user. Unknown keys are ignored.
    ///
    /// If the default user is removed, the first remaining user becomes the
    /// default.
    ///
    /// # Errors
    ///
    /// Returns save errors.
    pub fn remove(&mut self, key: &str) -> Result<()> {
        let Some(idx) = self.position(key) else {
            debug!(
                "User {key} not removed from {} -- user did not exist",
                self.tokens_file.display()
            );
            return Ok(());
        };

        self.records.remove(idx);
        debug!("Removed user {key} from {}", self.tokens_file.display());

        if self.default_key.as_deref() == Some(key) {
            self.default_key = self.records.first().map(IdentityRecord::key);
            match &self.default_key {
                Some(next) => debug!("Changed default user to first available user {next}"),
                None => debug!("Last user removed, no default user"),
            }
        }

        self.save()
    }

    /// Make the owner of `credential` the default user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotFound` if no user holds the credential, or
    /// save errors.
    pub fn set_default_by_credential(&mut self, credential: &str) -> Result<()> {
        let Some(key) = self.owner_of(credential) else {
            error!(
                "No user found with token ...{}",
                mask_credential(credential)
            );
            return Err(AuthError::NotFound(format!(
                "token ...{}",
                mask_credential(credential)
            )));
        };

        if self.default_key.as_deref() == Some(key.as_str()) {
            return Ok(());
        }

        self.default_key = Some(key.clone());
        self.save()?;
        debug!(
            "Set default user to {key} for token ...{}",
            mask_credential(credential)
        );
        Ok(())
    }

    /// Make `key` the default user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotFound` if the key is unknown, or save errors.
    pub fn set_default_by_key(&mut self, key: &str) -> Result<()> {
        if self.position(key).is_none() {
            error!("No user found with id {key}");
            return Err(AuthError::NotFound(key.to_string()));
        }

        if self.default_key.as_deref() == Some(key) {
            return Ok(());
        }

        self.default_key = Some(key.to_string());
        self.save()?;
        debug!("Default user set to {key}");
        Ok(())
    }

    /// Replace the stored credential for `key`.
    ///
    /// The new credential is not checked against the site.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotFound` if the key is unknown, or save errors.
    pub fn update_credential(&mut self, key: &str, credential: &str) -> Result<()> {
        let Some(idx) = self.position(key) else {
            error!("No user found with id {key}");
            return Err(AuthError::NotFound(key.to_string()));
        };

        if self.records[idx].credential == credential {
            return Ok(());
        }

        self.records[idx].set_credential(credential);
        self.save()?;
        debug!(
            "User id {key} updated to token ...{}",
            mask_credential(credential)
        );
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    /// Owned copy of every record, in insertion order.
    pub fn list_records(&self) -> Vec<IdentityRecord> {
        self.records.clone()
    }

    /// Key of the default user.
    pub fn default_key(&self) -> Option<&str> {
        self.default_key.as_deref()
    }

    /// Record of the default user.
    pub fn default_record(&self) -> Option<&IdentityRecord> {
        self.default_key.as_deref().and_then(|key| self.get(key))
    }

    /// Record stored under `key`.
    pub fn get(&self, key: &str) -> Option<&IdentityRecord> {
        self.position(key).map(|idx| &self.records[idx])
    }

    /// Key of the user holding `credential`.
    pub fn owner_of(&self, credential: &str) -> Option<String> {
        match self.records.iter().find(|r| r.credential == credential) {
            Some(record) => {
                let key = record.key();
                debug!(
                    "Found token ...{} owned by {key}",
                    mask_credential(credential)
                );
                Some(key)
            }
            None => {
                info!("No owner found for token ...{}", mask_credential(credential));
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Path of `tokens.json`.
    pub fn tokens_file(&self) -> &Path {
        &self.tokens_file
    }

    /// Path of the one-shot `token` file.
    pub fn credential_file(&self) -> &Path {
        &self.credential_file
    }

    /// Resolver used for new credentials.
    pub fn resolver(&self) -> &IdentityResolver<T> {
        &self.resolver
    }

    // ── Internal helpers ──────────────────────────────────────────────────────

    fn position(&self, key: &str) -> Option<usize> {
        self.records.iter().position(|r| r.key() == key)
    }

    /// Insert or replace by key, keeping the first insertion position.
    fn upsert(&mut self, record: IdentityRecord) {
        match self.position(&record.key()) {
            Some(idx) => self.records[idx] = record,
            None => self.records.push(record),
        }
    }

    fn default_if_unset(&mut self, key: &str) {
        if self.default_key.is_none() {
            self.default_key = Some(key.to_string());
            debug!("User {key} set as the default user ID");
        }
    }
}

/// Modification time of `path`, or `None` if it does not exist.
fn file_mtime(path: &Path) -> Result<Option<SystemTime>> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(Some(meta.modified()?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// First whitespace-delimited token of the one-shot credential file.
fn read_credential_file(path: &Path) -> Result<Option<String>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let token = contents.split_whitespace().next().map(str::to_string);
    if token.is_none() {
        warn!("Default token file {} is empty", path.display());
    }
    Ok(token)
}

/// Write `data` to `path` atomically using a sibling temporary file.
///
/// Creates the parent directory if it does not exist. A crash mid-write
/// leaves the previous file intact.
fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, data)?;
    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
