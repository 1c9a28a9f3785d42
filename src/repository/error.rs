//! Repository errors
//!
//! The closed set of outcomes the HTTP layer dispatches on.

use thiserror::Error;

use crate::error::KvError;

/// Errors returned by [`super::KvRepository`]
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Session could not be established at startup (fatal)
    #[error("connection to storage failed: {0}")]
    ConnectionFailed(#[source] KvError),

    #[error("409 key already exists")]
    AlreadyExists,

    #[error("404 key not found")]
    NotFound,

    #[error("insert operation failed")]
    InsertOperationFailed,

    #[error("select operation failed")]
    SelectOperationFailed,

    #[error("update operation failed")]
    UpdateOperationFailed,

    #[error("delete operation failed")]
    DeleteOperationFailed,

    /// Select could not complete the round trip at all
    #[error(transparent)]
    Transport(KvError),
}

impl RepositoryError {
    /// Expected outcomes a client can act on, as opposed to internal failures
    pub fn is_client_error(&self) -> bool {
        matches!(self, RepositoryError::AlreadyExists | RepositoryError::NotFound)
    }
}
