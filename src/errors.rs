// src/errors.rs

//! Crate-wide error aliases.
//!
//! Only configuration errors stop a run; storage-layer failures are logged
//! and degrade gracefully. This module is a thin wrapper around `anyhow`,
//! giving a single place to add more structured error types later.

pub use anyhow::{Error, Result};
