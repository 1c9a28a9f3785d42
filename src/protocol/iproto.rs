//! IPROTO constants
//!
//! Numeric keys and codes of the engine's binary protocol. Only the subset
//! the gateway speaks is listed.

// =============================================================================
// Request Types (header key REQUEST_TYPE)
// =============================================================================

pub const REQUEST_OK: u32 = 0x00;
pub const REQUEST_SELECT: u32 = 0x01;
pub const REQUEST_INSERT: u32 = 0x02;
pub const REQUEST_UPDATE: u32 = 0x04;
pub const REQUEST_DELETE: u32 = 0x05;
pub const REQUEST_AUTH: u32 = 0x07;
pub const REQUEST_PING: u32 = 0x40;

/// Set in a response code when the engine reports an error
pub const TYPE_ERROR: u32 = 0x8000;

// =============================================================================
// Header Keys
// =============================================================================

pub const KEY_REQUEST_TYPE: u64 = 0x00;
pub const KEY_SYNC: u64 = 0x01;
pub const KEY_SCHEMA_VERSION: u64 = 0x05;

// =============================================================================
// Body Keys
// =============================================================================

pub const KEY_SPACE_ID: u64 = 0x10;
pub const KEY_INDEX_ID: u64 = 0x11;
pub const KEY_LIMIT: u64 = 0x12;
pub const KEY_OFFSET: u64 = 0x13;
pub const KEY_ITERATOR: u64 = 0x14;
pub const KEY_KEY: u64 = 0x20;
pub const KEY_TUPLE: u64 = 0x21;
pub const KEY_USER_NAME: u64 = 0x23;
pub const KEY_DATA: u64 = 0x30;
pub const KEY_ERROR_24: u64 = 0x31;

// =============================================================================
// Engine Error Codes (response code & 0x7fff)
// =============================================================================

/// Duplicate key exists in unique index
pub const ER_TUPLE_FOUND: u32 = 3;
pub const ER_NO_SUCH_SPACE: u32 = 36;
pub const ER_CREDS_MISMATCH: u32 = 47;

// =============================================================================
// Misc
// =============================================================================

/// Iterator type EQ for selects by key
pub const ITERATOR_EQ: u32 = 0;

/// System view listing the spaces visible to the current user
pub const VSPACE_ID: u32 = 281;

/// `_vspace` secondary index on the space name
pub const VSPACE_NAME_INDEX: u32 = 2;

/// Authentication mechanism name
pub const CHAP_SHA1: &str = "chap-sha1";
