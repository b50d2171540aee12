//! Storage layer for the user registry.
//!
//! Handles the `tokens.json` file format, the one-shot `token` import
//! file, and optimistic conflict detection against other writers.
//!
//! # Modules
//!
//! - [`registry`]: the `Registry` of known users and its persistence.

pub mod registry;

pub use registry::{Registry, TokensFile};
