//! Memory collaborator interface.
//!
//! The core treats long-term recall as an opaque key/value collaborator:
//! executors read and write through these traits and never depend on the
//! backing store. `InMemoryStore` is the transient implementation used in
//! tests and demos.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Validated memory key that prevents typos and keeps backends portable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemoryKey(String);

/// Errors that can occur when creating a `MemoryKey`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidMemoryKey {
    /// Key is empty or contains only whitespace.
    Empty,
    /// Key exceeds the maximum allowed length.
    TooLong(usize),
    /// Key contains characters outside `[A-Za-z0-9._:-]`.
    InvalidChars(String),
}

impl std::fmt::Display for InvalidMemoryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidMemoryKey::Empty => write!(f, "memory key cannot be empty"),
            InvalidMemoryKey::TooLong(len) => {
                write!(f, "memory key too long: {} characters (max 128)", len)
            }
            InvalidMemoryKey::InvalidChars(key) => {
                write!(f, "memory key contains invalid characters: '{}'", key)
            }
        }
    }
}

impl std::error::Error for InvalidMemoryKey {}

impl MemoryKey {
    /// Maximum allowed length for memory keys.
    pub const MAX_LENGTH: usize = 128;

    /// Create a new validated memory key.
    pub fn new(key: &str) -> Result<Self, InvalidMemoryKey> {
        if key.trim().is_empty() {
            return Err(InvalidMemoryKey::Empty);
        }
        if key.len() > Self::MAX_LENGTH {
            return Err(InvalidMemoryKey::TooLong(key.len()));
        }
        if !key
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
        {
            return Err(InvalidMemoryKey::InvalidChars(key.to_string()));
        }
        Ok(MemoryKey(key.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A single key/value write.
#[derive(Debug, Clone)]
pub struct MemoryUpdate {
    pub key: MemoryKey,
    pub value: String,
}

impl MemoryUpdate {
    /// Build an update, validating the key.
    pub fn new(key: &str, value: impl Into<String>) -> Result<Self, InvalidMemoryKey> {
        Ok(Self {
            key: MemoryKey::new(key)?,
            value: value.into(),
        })
    }

    /// Build an update from an already-validated key.
    pub fn from_validated(key: MemoryKey, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

/// Result type for memory operations
pub type MemoryResult<T> = Result<T, MemoryError>;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Load failed for key '{key}': {reason}")]
    LoadFailed { key: String, reason: String },

    #[error("Store failed for key '{key}': {reason}")]
    StoreFailed { key: String, reason: String },
}

/// Read access to the memory collaborator.
pub trait MemoryReader: Send + Sync {
    fn load(&self, key: &MemoryKey) -> MemoryResult<Option<String>>;

    /// Prefix query over stored keys, for recall across a namespace
    /// (e.g. every note one agent has written).
    fn load_prefix(&self, prefix: &str) -> MemoryResult<Vec<(MemoryKey, String)>>;
}

/// Write access to the memory collaborator.
pub trait MemoryWriter: Send + Sync {
    fn store(&self, update: MemoryUpdate) -> MemoryResult<()>;
}

/// Combined read/write handle, usable as a trait object.
pub trait MemoryStore: MemoryReader + MemoryWriter {}

impl<T: MemoryReader + MemoryWriter> MemoryStore for T {}

/// Fast, transient memory backend.
///
/// All data is lost when the process terminates; suitable for tests and
/// single-run workflows.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<RwLock<HashMap<MemoryKey, String>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemoryReader for InMemoryStore {
    fn load(&self, key: &MemoryKey) -> MemoryResult<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| MemoryError::LoadFailed {
                key: key.as_str().to_string(),
                reason: e.to_string(),
            })?;
        Ok(entries.get(key).cloned())
    }

    fn load_prefix(&self, prefix: &str) -> MemoryResult<Vec<(MemoryKey, String)>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| MemoryError::LoadFailed {
                key: prefix.to_string(),
                reason: e.to_string(),
            })?;
        let mut matches: Vec<(MemoryKey, String)> = entries
            .iter()
            .filter(|(k, _)| k.as_str().starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        matches.sort_by(|(a, _), (b, _)| a.as_str().cmp(b.as_str()));
        Ok(matches)
    }
}

impl MemoryWriter for InMemoryStore {
    fn store(&self, update: MemoryUpdate) -> MemoryResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| MemoryError::StoreFailed {
                key: update.key.as_str().to_string(),
                reason: e.to_string(),
            })?;
        entries.insert(update.key, update.value);
        Ok(())
    }
}
