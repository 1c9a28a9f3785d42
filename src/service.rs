//! Use case layer
//!
//! Decouples the HTTP handlers from the repository. Calls here block on
//! engine I/O; async callers should run them on a blocking thread.

use serde_json::value::RawValue;
use thiserror::Error;

use crate::network::{Connection, Session};
use crate::protocol::Record;
use crate::repository::{KvRepository, Result};

/// Client input rejected before it reaches storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidInput {
    #[error("invalid JSON format")]
    InvalidJson,

    #[error("missing key")]
    MissingKey,

    #[error("missing value")]
    MissingValue,
}

/// Keys are non-empty strings
pub fn validate_key(key: &str) -> std::result::Result<(), InvalidInput> {
    if key.is_empty() {
        return Err(InvalidInput::MissingKey);
    }
    Ok(())
}

/// A stored value must be a JSON document other than `null`
pub fn validate_value(value: &RawValue) -> std::result::Result<(), InvalidInput> {
    if value.get() == "null" {
        return Err(InvalidInput::MissingValue);
    }
    Ok(())
}

/// Parse `text` as the JSON value to store
///
/// The returned slice is the exact text that will be written.
pub fn parse_value(text: &str) -> std::result::Result<&RawValue, InvalidInput> {
    let value: &RawValue = serde_json::from_str(text).map_err(|_| InvalidInput::InvalidJson)?;
    validate_value(value)?;
    Ok(value)
}

/// CRUD use cases over a [`KvRepository`]
pub struct KvService<S: Session = Connection> {
    repo: KvRepository<S>,
}

impl<S: Session> KvService<S> {
    pub fn new(repo: KvRepository<S>) -> Self {
        Self { repo }
    }

    pub fn create(&self, key: &str, value: &[u8]) -> Result<Record> {
        tracing::debug!(key, size = value.len(), "Create request was made");
        self.repo.insert(key, value)
    }

    pub fn read(&self, key: &str) -> Result<Record> {
        tracing::debug!(key, "Read request was made");
        self.repo.select(key)
    }

    pub fn update(&self, key: &str, value: &[u8]) -> Result<Record> {
        tracing::debug!(key, size = value.len(), "Update request was made");
        self.repo.update(key, value)
    }

    pub fn delete(&self, key: &str) -> Result<Record> {
        tracing::debug!(key, "Delete request was made");
        self.repo.delete(key)
    }

    pub fn repository(&self) -> &KvRepository<S> {
        &self.repo
    }

    /// Release the storage session; call once, after the last request
    pub fn shutdown(&self) {
        self.repo.close();
    }
}
