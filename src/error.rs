//! Error types for kvgate
//!
//! Provides a unified error type for the wire protocol and the session
//! layer. The repository maps these onto its own closed taxonomy
//! (see [`crate::repository::RepositoryError`]).

use thiserror::Error;

/// Result type alias using KvError
pub type Result<T> = std::result::Result<T, KvError>;

/// Unified error type for protocol and connection operations
#[derive(Debug, Error)]
pub enum KvError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Wire Format Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Malformed record: expected 2 fields, got {len}")]
    MalformedRecord { len: u32 },

    #[error("Encode error: {0}")]
    Encode(String),

    // -------------------------------------------------------------------------
    // Engine Errors
    // -------------------------------------------------------------------------
    #[error("Engine error {code}: {message}")]
    Server { code: u32, message: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Space not found: {0}")]
    SpaceNotFound(String),

    // -------------------------------------------------------------------------
    // Session Errors
    // -------------------------------------------------------------------------
    #[error("Request timed out")]
    Timeout,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Connection to {addr} failed: {reason}")]
    ConnectionFailed { addr: String, reason: String },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<rmp::encode::ValueWriteError> for KvError {
    fn from(err: rmp::encode::ValueWriteError) -> Self {
        KvError::Encode(err.to_string())
    }
}

impl From<rmp::decode::ValueReadError> for KvError {
    fn from(err: rmp::decode::ValueReadError) -> Self {
        KvError::Protocol(err.to_string())
    }
}

impl From<rmp::decode::NumValueReadError> for KvError {
    fn from(err: rmp::decode::NumValueReadError) -> Self {
        KvError::Protocol(err.to_string())
    }
}

impl From<rmpv::decode::Error> for KvError {
    fn from(err: rmpv::decode::Error) -> Self {
        KvError::Protocol(err.to_string())
    }
}

impl KvError {
    /// True when the error means the socket is gone rather than a bad reply
    pub fn is_disconnect(&self) -> bool {
        match self {
            KvError::ConnectionClosed => true,
            KvError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}
