//! Request definitions
//!
//! Represents requests sent to the engine.

use super::iproto;
use super::record::{Record, VALUE_FIELD};

/// A single update operation on a tuple field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOp {
    /// Replace the field at `field` (0-based) with `value`
    Assign { field: u32, value: Vec<u8> },
}

impl UpdateOp {
    /// Assign a new payload to the value slot of a `[key, value]` tuple
    pub fn assign_value(value: impl Into<Vec<u8>>) -> Self {
        UpdateOp::Assign {
            field: VALUE_FIELD,
            value: value.into(),
        }
    }
}

/// A request to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Health check
    Ping,

    /// chap-sha1 authentication
    Auth { user: String, scramble: Vec<u8> },

    /// Select tuples whose index key equals `key`
    Select {
        space_id: u32,
        index_id: u32,
        key: String,
        limit: u32,
    },

    /// Insert a new tuple, failing on a duplicate primary key
    Insert { space_id: u32, record: Record },

    /// Update the tuple with primary key `key`
    Update {
        space_id: u32,
        key: String,
        ops: Vec<UpdateOp>,
    },

    /// Delete the tuple with primary key `key`
    Delete { space_id: u32, key: String },
}

impl Request {
    /// Select by primary key, returning every match
    pub fn select(space_id: u32, key: impl Into<String>) -> Self {
        Request::Select {
            space_id,
            index_id: 0,
            key: key.into(),
            limit: u32::MAX,
        }
    }

    /// IPROTO request type code
    pub fn request_type(&self) -> u32 {
        match self {
            Request::Ping => iproto::REQUEST_PING,
            Request::Auth { .. } => iproto::REQUEST_AUTH,
            Request::Select { .. } => iproto::REQUEST_SELECT,
            Request::Insert { .. } => iproto::REQUEST_INSERT,
            Request::Update { .. } => iproto::REQUEST_UPDATE,
            Request::Delete { .. } => iproto::REQUEST_DELETE,
        }
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Request::Ping => "ping",
            Request::Auth { .. } => "auth",
            Request::Select { .. } => "select",
            Request::Insert { .. } => "insert",
            Request::Update { .. } => "update",
            Request::Delete { .. } => "delete",
        }
    }
}
