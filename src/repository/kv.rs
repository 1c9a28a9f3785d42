//! KV Repository
//!
//! CRUD over the `[key, value]` space, with classification of engine
//! responses into [`RepositoryError`].

use std::borrow::Cow;

use crate::config::Config;
use crate::error::{KvError, Result as KvResult};
use crate::network::{resolve_space_id, Connection, Credentials, Session};
use crate::protocol::iproto::ER_TUPLE_FOUND;
use crate::protocol::{Record, Request, Response, ResponseHeader, UpdateOp};

use super::RepositoryError;

/// Result type for repository operations
pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Space used when none is configured
pub const DEFAULT_SPACE: &str = "kv_storage";

/// Decide the outcome of an INSERT from the response header alone
///
/// A successful insert needs no body decode. On conflict the engine sends no
/// tuple, only an error code in the header, so duplicate detection reads
/// that code.
pub fn classify_insert_outcome(
    outcome: std::result::Result<&ResponseHeader, &KvError>,
) -> Result<()> {
    match outcome {
        Ok(header) => match header.error_code() {
            None => Ok(()),
            Some(ER_TUPLE_FOUND) => Err(RepositoryError::AlreadyExists),
            Some(_) => Err(RepositoryError::InsertOperationFailed),
        },
        Err(_) => Err(RepositoryError::InsertOperationFailed),
    }
}

/// Best description of what went wrong in a round trip, for logs
fn failure_cause(outcome: &KvResult<Response>) -> String {
    match outcome {
        Ok(response) => match response.header.error_code() {
            Some(code) => format!(
                "engine error {}: {}",
                code,
                response.error_message().unwrap_or_default()
            ),
            None => "ok".to_string(),
        },
        Err(e) => e.to_string(),
    }
}

fn lossy(value: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(value)
}

/// Repository over a single `[key, value]` space
///
/// Generic over the [`Session`] so it can run against fakes; production
/// code uses a [`Connection`].
pub struct KvRepository<S: Session = Connection> {
    session: S,

    /// Space name, for logs
    space: String,

    /// Resolved space id used in every request
    space_id: u32,
}

impl KvRepository<Connection> {
    /// Connect to the engine described by `config` and resolve the space
    ///
    /// Any failure is `ConnectionFailed`; callers abort startup on it.
    pub fn connect(config: &Config) -> Result<Self> {
        let credentials = Credentials::new(config.user.clone(), config.password.clone());
        let connection = Connection::connect_with(
            &config.storage_addr,
            &credentials,
            config.connect_timeout,
            config.request_timeout,
        )
        .map_err(RepositoryError::ConnectionFailed)?;

        Self::open(connection, &config.space)
    }
}

impl<S: Session> KvRepository<S> {
    /// Wrap an established session, resolving `space` to its id
    pub fn open(session: S, space: &str) -> Result<Self> {
        let space_id = match resolve_space_id(&session, space) {
            Ok(id) => id,
            Err(e) => {
                // the session is useless without its space
                if let Err(close_err) = session.close() {
                    tracing::warn!("Error closing storage connection: {}", close_err);
                }
                return Err(RepositoryError::ConnectionFailed(e));
            }
        };
        tracing::debug!("Resolved space {} to id {}", space, space_id);

        Ok(Self::with_space_id(session, space, space_id))
    }

    /// Wrap a session for a space whose id is already known
    pub fn with_space_id(session: S, space: &str, space_id: u32) -> Self {
        Self {
            session,
            space: space.to_string(),
            space_id,
        }
    }

    pub fn space(&self) -> &str {
        &self.space
    }

    pub fn space_id(&self) -> u32 {
        self.space_id
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    // =========================================================================
    // CRUD
    // =========================================================================

    /// Insert a new record
    ///
    /// - `AlreadyExists` if the key is present (existing record untouched)
    /// - `InsertOperationFailed` on any other engine or transport failure
    pub fn insert(&self, key: &str, value: &[u8]) -> Result<Record> {
        tracing::debug!(space = %self.space, key, value = %lossy(value), "Insert request");

        let record = Record::new(key, value);
        let outcome = self.session.call(Request::Insert {
            space_id: self.space_id,
            record: record.clone(),
        });

        match classify_insert_outcome(outcome.as_ref().map(|r| &r.header)) {
            Ok(()) => {
                tracing::debug!(key, value = %lossy(value), "Insert succeeded");
                Ok(record)
            }
            Err(e) => {
                tracing::debug!(
                    key,
                    value = %lossy(value),
                    cause = %failure_cause(&outcome),
                    "Insert failed: {}",
                    e
                );
                Err(e)
            }
        }
    }

    /// Fetch the record stored under `key`
    ///
    /// - `NotFound` if absent
    /// - `SelectOperationFailed` if the engine replied but the reply is an
    ///   error or undecodable
    /// - `Transport` if the round trip itself failed
    pub fn select(&self, key: &str) -> Result<Record> {
        tracing::debug!(space = %self.space, key, "Select request");

        let response = self
            .session
            .call(Request::select(self.space_id, key))
            .map_err(|e| {
                tracing::debug!(key, cause = %e, "Select transport failure");
                RepositoryError::Transport(e)
            })?;

        let records = response.records().map_err(|e| {
            tracing::debug!(key, cause = %e, "Select response unreadable");
            RepositoryError::SelectOperationFailed
        })?;

        let record = first_or_not_found(records)?;
        tracing::debug!(key, value = %lossy(&record.value), "Select succeeded");
        Ok(record)
    }

    /// Replace the value stored under `key`, returning the updated record
    ///
    /// Only the value field is assigned; the key is never rewritten.
    pub fn update(&self, key: &str, value: &[u8]) -> Result<Record> {
        tracing::debug!(space = %self.space, key, value = %lossy(value), "Update request");

        let records = self
            .session
            .call(Request::Update {
                space_id: self.space_id,
                key: key.to_string(),
                ops: vec![UpdateOp::assign_value(value)],
            })
            .and_then(|response| response.records())
            .map_err(|e| {
                tracing::debug!(key, value = %lossy(value), cause = %e, "Update failed");
                RepositoryError::UpdateOperationFailed
            })?;

        let record = first_or_not_found(records)?;
        tracing::debug!(key, value = %lossy(&record.value), "Update succeeded");
        Ok(record)
    }

    /// Remove `key`, returning the record that was deleted
    pub fn delete(&self, key: &str) -> Result<Record> {
        tracing::debug!(space = %self.space, key, "Delete request");

        let records = self
            .session
            .call(Request::Delete {
                space_id: self.space_id,
                key: key.to_string(),
            })
            .and_then(|response| response.records())
            .map_err(|e| {
                tracing::debug!(key, cause = %e, "Delete failed");
                RepositoryError::DeleteOperationFailed
            })?;

        let record = first_or_not_found(records)?;
        tracing::debug!(key, value = %lossy(&record.value), "Delete succeeded");
        Ok(record)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Check the engine is reachable
    pub fn ping(&self) -> KvResult<()> {
        self.session.ping()
    }

    /// Close the session; failures are logged, never returned
    pub fn close(&self) {
        match self.session.close() {
            Ok(()) => tracing::info!("Storage connection closed"),
            Err(e) => tracing::warn!("Error closing storage connection: {}", e),
        }
    }
}

fn first_or_not_found(records: Vec<Record>) -> Result<Record> {
    records.into_iter().next().ok_or(RepositoryError::NotFound)
}
