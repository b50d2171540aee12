//! Runtime configuration for aoc-runner.
//!
//! All paths and domain constants are resolved once into a [`Config`]
//! which is then passed explicitly to the registry and resolver. Nothing
//! in the library reads the process environment after construction.
//!
//! # Directory layout
//!
//! ```text
//! ~/.config/.aoc_runner/      (AOC_RUNNER_DIR)
//! ├── .auth/                  (AOC_RUNNER_AUTH_DIR)
//! │   ├── tokens.json
//! │   └── token               one-shot default credential
//! ├── users/                  (AOC_RUNNER_USERS_DIR)
//! │   └── {source}.{aoc_id}/
//! └── cache/                  (AOC_RUNNER_CACHE_DIR)
//! ```

use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{AuthError, Result};

// ── Environment variable names ────────────────────────────────────────────────

pub const RUNNER_DIR: &str = "AOC_RUNNER_DIR";
pub const RUNNER_HOME: &str = "AOC_RUNNER_PROJECT_HOME";
pub const RUNNER_AUTH: &str = "AOC_RUNNER_AUTH_DIR";
pub const RUNNER_USERS: &str = "AOC_RUNNER_USERS_DIR";
pub const RUNNER_CACHE: &str = "AOC_RUNNER_CACHE_DIR";
pub const RUNNER_DOMAIN: &str = "AOC_RUNNER_DOMAIN";
pub const RUNNER_SESSION: &str = "AOC_RUNNER_SESSION";

/// Default site the client talks to.
pub const AOC_DOMAIN: &str = "https://adventofcode.com";

/// Name of the persisted user registry inside the auth directory.
pub const TOKENS_FILE: &str = "tokens.json";

/// Name of the one-shot default credential file inside the auth directory.
pub const CREDENTIAL_FILE: &str = "token";

/// Resolved configuration shared by the registry and resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the puzzle site, without a trailing slash.
    pub domain: String,
    /// Root of all runner state.
    pub runner_dir: PathBuf,
    /// Project checkout the runner works on behalf of.
    pub project_home: PathBuf,
    /// Holds `tokens.json` and the one-shot `token` file.
    pub auth_dir: PathBuf,
    /// Per-user cache directories.
    pub users_dir: PathBuf,
    /// Shared (non-user) cache.
    pub cache_dir: PathBuf,
    /// Inline credential override, takes precedence over the one-shot file.
    pub session_override: Option<String>,
}

impl Config {
    /// Build a configuration from the process environment and create the
    /// runner directories.
    pub fn from_env() -> Result<Self> {
        let config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.ensure_dirs()?;
        Ok(config)
    }

    /// Build a configuration from an arbitrary variable lookup.
    ///
    /// Does not touch the filesystem.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let runner_dir = match (var(RUNNER_DIR), var(RUNNER_HOME)) {
            (Some(dir), _) => PathBuf::from(dir),
            (None, Some(home)) => PathBuf::from(home).join(".config").join(".aoc_runner"),
            (None, None) => dirs::home_dir()
                .ok_or_else(|| {
                    AuthError::InvalidArgument("unable to determine home directory".to_string())
                })?
                .join(".config")
                .join(".aoc_runner"),
        };

        let project_home = match var(RUNNER_HOME) {
            Some(home) => PathBuf::from(home),
            None => {
                let cwd = std::env::current_dir()?;
                cwd.parent().map(Path::to_path_buf).unwrap_or(cwd)
            }
        };

        let auth_dir = var(RUNNER_AUTH)
            .map(PathBuf::from)
            .unwrap_or_else(|| runner_dir.join(".auth"));
        let users_dir = var(RUNNER_USERS)
            .map(PathBuf::from)
            .unwrap_or_else(|| runner_dir.join("users"));
        let cache_dir = var(RUNNER_CACHE)
            .map(PathBuf::from)
            .unwrap_or_else(|| runner_dir.join("cache"));

        let domain = var(RUNNER_DOMAIN)
            .map(|d| d.trim_end_matches('/').to_string())
            .unwrap_or_else(|| AOC_DOMAIN.to_string());

        Ok(Self {
            domain,
            runner_dir,
            project_home,
            auth_dir,
            users_dir,
            cache_dir,
            session_override: var(RUNNER_SESSION).map(|s| s.trim().to_string()),
        })
    }

    /// Configuration rooted at a single directory, with no credential
    /// override. Used by tests and embedders that manage their own layout.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            domain: AOC_DOMAIN.to_string(),
            project_home: root.clone(),
            auth_dir: root.join(".auth"),
            users_dir: root.join("users"),
            cache_dir: root.join("cache"),
            runner_dir: root,
            session_override: None,
        }
    }

    /// Replace the inline credential override.
    pub fn with_session(mut self, credential: impl Into<String>) -> Self {
        self.session_override = Some(credential.into());
        self
    }

    /// Create every directory the runner writes to.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidArgument` if one of the paths exists as a
    /// regular file, or `AuthError::Io` if a directory cannot be created.
    pub fn ensure_dirs(&self) -> Result<()> {
        for (name, path) in [
            (RUNNER_DIR, &self.runner_dir),
            (RUNNER_AUTH, &self.auth_dir),
            (RUNNER_USERS, &self.users_dir),
            (RUNNER_CACHE, &self.cache_dir),
        ] {
            ensure_dir(name, path)?;
        }
        Ok(())
    }

    /// Path of the persisted user registry.
    pub fn tokens_file(&self) -> PathBuf {
        self.auth_dir.join(TOKENS_FILE)
    }

    /// Path of the one-shot default credential file.
    pub fn credential_file(&self) -> PathBuf {
        self.auth_dir.join(CREDENTIAL_FILE)
    }

    /// URL of the account settings page used to resolve identities.
    pub fn settings_url(&self) -> String {
        format!("{}/settings", self.domain)
    }
}

fn ensure_dir(name: &str, path: &Path) -> Result<()> {
    if path.is_file() {
        return Err(AuthError::InvalidArgument(format!(
            "{name} path {} is a file, expected a directory",
            path.display()
        )));
    }
    if !path.exists() {
        std::fs::create_dir_all(path)?;
        debug!("Created {name} directory {}", path.display());
    }
    Ok(())
}
