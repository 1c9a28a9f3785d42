//! Request and response bodies
//!
//! Values are kept as [`RawValue`] so the JSON a client sends is stored and
//! echoed byte-for-byte.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// `POST /kv` body
#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub key: Option<String>,
    pub value: Option<Box<RawValue>>,
}

/// `PUT /kv/{id}` body
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateRequest {
    /// `null` parses as the text `null`, not as a missing field
    pub value: Box<RawValue>,
}

/// Reply to create and update
#[derive(Debug, Serialize)]
pub struct WriteResponse {
    pub message: &'static str,
    pub key: String,
    /// Byte length of the stored value
    pub size: usize,
}

/// Reply carrying a stored record
#[derive(Debug, Serialize)]
pub struct RecordResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub key: String,
    pub value: Box<RawValue>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
