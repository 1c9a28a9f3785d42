//! # kvgate
//!
//! An HTTP/JSON key-value gateway in front of a Tarantool-compatible
//! storage engine:
//! - IPROTO binary protocol codec (MessagePack framing)
//! - Pipelined, authenticated engine connection
//! - Repository classifying engine replies into typed outcomes
//! - axum HTTP front end with graceful shutdown
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     HTTP (axum)                              │
//! │                 POST/GET/PUT/DELETE /kv                      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                   KvService                                  │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                  KvRepository                                │
//! │        (outcome classification, space resolution)            │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ Session
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                   Connection                                 │
//! │      (greeting, chap-sha1 auth, pipelined by sync id)        │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ IPROTO over TCP
//!                       ▼
//!                 storage engine
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod network;
pub mod repository;
pub mod service;
pub mod http;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{KvError, Result};
pub use config::Config;
pub use network::{Connection, Credentials, Session};
pub use protocol::Record;
pub use repository::{KvRepository, RepositoryError};
pub use service::{InvalidInput, KvService};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of kvgate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
