//! Protocol Module
//!
//! Client side of the engine's binary protocol (IPROTO).
//!
//! ## Packet Format
//! ```text
//! ┌──────────────┬──────────────────┬──────────────────────┐
//! │ Size (5)     │  Header (map)    │     Body (map)       │
//! └──────────────┴──────────────────┴──────────────────────┘
//! ```
//!
//! ### Requests used
//! - 0x01: SELECT - body: space, index, limit, offset, iterator, key
//! - 0x02: INSERT - body: space, tuple
//! - 0x04: UPDATE - body: space, index, key, ops
//! - 0x05: DELETE - body: space, index, key
//! - 0x07: AUTH   - body: user, ["chap-sha1", scramble]
//! - 0x40: PING   - body: empty
//!
//! ### Response Codes
//! - 0x0000: OK, body carries DATA
//! - 0x8000 | errcode: error, body carries the message
//!
//! ### Records
//! Every tuple in the `kv_storage` space is `[key: str, value: bin]`.

pub mod iproto;

mod codec;
mod greeting;
mod record;
mod request;
mod response;

pub use codec::{
    decode_request, decode_response, encode_request, encode_response, read_request,
    read_response, write_request, write_response, MAX_PACKET_SIZE,
};
pub use greeting::{scramble, Greeting, GREETING_SIZE, SCRAMBLE_SIZE};
pub use record::{
    decode_record, decode_records, encode_record, encode_records, read_record, write_record,
    Record, RECORD_FIELDS, VALUE_FIELD,
};
pub use request::{Request, UpdateOp};
pub use response::{Response, ResponseHeader};
