//! Protocol codec
//!
//! Encoding and decoding functions for the IPROTO packet framing.
//!
//! ## Wire Format
//!
//! ```text
//! ┌──────────────┬──────────────────┬──────────────────────┐
//! │ Size (5)     │  Header (map)    │     Body (map)       │
//! │ 0xce + u32be │  {type, sync}    │  {space, key, ...}   │
//! └──────────────┴──────────────────┴──────────────────────┘
//! ```
//!
//! `Size` counts the header and body bytes. All keys are small unsigned
//! integers (see [`super::iproto`]).

use std::io::{Read, Write};

use bytes::Bytes;
use rmpv::ValueRef;

use crate::error::{KvError, Result};

use super::iproto;
use super::record::{decode_record, write_record};
use super::request::{Request, UpdateOp};
use super::response::{Response, ResponseHeader};

/// Maximum packet size (16 MB)
pub const MAX_PACKET_SIZE: u32 = 16 * 1024 * 1024;

// =============================================================================
// Shared Helpers
// =============================================================================

/// Prefix a header+body payload with its MessagePack-encoded size
fn frame(payload: Vec<u8>) -> Result<Vec<u8>> {
    if payload.len() > MAX_PACKET_SIZE as usize {
        return Err(KvError::Protocol(format!(
            "Packet too large: {} bytes (max {})",
            payload.len(),
            MAX_PACKET_SIZE
        )));
    }

    let mut message = Vec::with_capacity(5 + payload.len());
    rmp::encode::write_u32(&mut message, payload.len() as u32)?;
    message.extend_from_slice(&payload);
    Ok(message)
}

/// Raw bytes of the value stored under `key` in an encoded map
///
/// An empty input counts as an empty map.
pub(crate) fn map_field(map: &[u8], key: u64) -> Result<Option<&[u8]>> {
    if map.is_empty() {
        return Ok(None);
    }

    let mut rd = map;
    let len = rmp::decode::read_map_len(&mut rd)?;
    for _ in 0..len {
        let field_key: u64 = rmp::decode::read_int(&mut rd)?;
        let start = map.len() - rd.len();
        rmpv::decode::read_value_ref(&mut rd)?;
        let end = map.len() - rd.len();

        if field_key == key {
            return Ok(Some(&map[start..end]));
        }
    }
    Ok(None)
}

fn required_field(map: &[u8], key: u64) -> Result<&[u8]> {
    map_field(map, key)?
        .ok_or_else(|| KvError::Protocol(format!("missing body field 0x{:02x}", key)))
}

fn read_uint(mut rd: &[u8]) -> Result<u64> {
    Ok(rmp::decode::read_int(&mut rd)?)
}

fn read_string(rd: &mut &[u8]) -> Result<String> {
    match rmpv::decode::read_value_ref(rd)? {
        ValueRef::String(s) => s
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| KvError::Protocol("string is not valid UTF-8".to_string())),
        other => Err(KvError::Protocol(format!("expected string, got {}", other))),
    }
}

fn read_bytes(rd: &mut &[u8]) -> Result<Vec<u8>> {
    match rmpv::decode::read_value_ref(rd)? {
        ValueRef::Binary(bytes) => Ok(bytes.to_vec()),
        ValueRef::String(s) => Ok(s.as_bytes().to_vec()),
        other => Err(KvError::Protocol(format!("expected bytes, got {}", other))),
    }
}

/// Read a single-part key `[key]`
fn read_key(mut rd: &[u8]) -> Result<String> {
    let parts = rmp::decode::read_array_len(&mut rd)?;
    if parts != 1 {
        return Err(KvError::Protocol(format!(
            "expected a single-part key, got {} parts",
            parts
        )));
    }
    read_string(&mut rd)
}

fn write_key(buf: &mut Vec<u8>, key: &str) -> Result<()> {
    rmp::encode::write_array_len(buf, 1)?;
    rmp::encode::write_str(buf, key)?;
    Ok(())
}

/// Read a size prefix and the packet it announces
fn read_packet<R: Read>(reader: &mut R) -> Result<Bytes> {
    use rmp::decode::NumValueReadError;

    // socket errors stay I/O errors so callers can spot a dropped peer
    let len = match rmp::decode::read_int::<u32, _>(reader) {
        Ok(len) => len,
        Err(NumValueReadError::InvalidMarkerRead(e))
        | Err(NumValueReadError::InvalidDataRead(e)) => return Err(KvError::Io(e)),
        Err(NumValueReadError::TypeMismatch(marker)) => {
            return Err(KvError::Protocol(format!(
                "Invalid packet size marker: {:?}",
                marker
            )))
        }
        Err(NumValueReadError::OutOfRange) => {
            return Err(KvError::Protocol("Packet size out of range".to_string()))
        }
    };

    if len > MAX_PACKET_SIZE {
        return Err(KvError::Protocol(format!(
            "Packet too large: {} bytes (max {})",
            len, MAX_PACKET_SIZE
        )));
    }

    let mut packet = vec![0u8; len as usize];
    reader.read_exact(&mut packet)?;
    Ok(Bytes::from(packet))
}

// =============================================================================
// Request Encoding/Decoding
// =============================================================================

fn write_request_body(buf: &mut Vec<u8>, request: &Request) -> Result<()> {
    match request {
        Request::Ping => {
            rmp::encode::write_map_len(buf, 0)?;
        }
        Request::Auth { user, scramble } => {
            rmp::encode::write_map_len(buf, 2)?;
            rmp::encode::write_uint(buf, iproto::KEY_USER_NAME)?;
            rmp::encode::write_str(buf, user)?;
            rmp::encode::write_uint(buf, iproto::KEY_TUPLE)?;
            rmp::encode::write_array_len(buf, 2)?;
            rmp::encode::write_str(buf, iproto::CHAP_SHA1)?;
            // the engine expects the raw scramble inside a str
            rmp::encode::write_str_len(buf, scramble.len() as u32)?;
            buf.extend_from_slice(scramble);
        }
        Request::Select {
            space_id,
            index_id,
            key,
            limit,
        } => {
            rmp::encode::write_map_len(buf, 6)?;
            rmp::encode::write_uint(buf, iproto::KEY_SPACE_ID)?;
            rmp::encode::write_uint(buf, *space_id as u64)?;
            rmp::encode::write_uint(buf, iproto::KEY_INDEX_ID)?;
            rmp::encode::write_uint(buf, *index_id as u64)?;
            rmp::encode::write_uint(buf, iproto::KEY_LIMIT)?;
            rmp::encode::write_uint(buf, *limit as u64)?;
            rmp::encode::write_uint(buf, iproto::KEY_OFFSET)?;
            rmp::encode::write_uint(buf, 0)?;
            rmp::encode::write_uint(buf, iproto::KEY_ITERATOR)?;
            rmp::encode::write_uint(buf, iproto::ITERATOR_EQ as u64)?;
            rmp::encode::write_uint(buf, iproto::KEY_KEY)?;
            write_key(buf, key)?;
        }
        Request::Insert { space_id, record } => {
            rmp::encode::write_map_len(buf, 2)?;
            rmp::encode::write_uint(buf, iproto::KEY_SPACE_ID)?;
            rmp::encode::write_uint(buf, *space_id as u64)?;
            rmp::encode::write_uint(buf, iproto::KEY_TUPLE)?;
            write_record(buf, record)?;
        }
        Request::Update { space_id, key, ops } => {
            rmp::encode::write_map_len(buf, 4)?;
            rmp::encode::write_uint(buf, iproto::KEY_SPACE_ID)?;
            rmp::encode::write_uint(buf, *space_id as u64)?;
            rmp::encode::write_uint(buf, iproto::KEY_INDEX_ID)?;
            rmp::encode::write_uint(buf, 0)?;
            rmp::encode::write_uint(buf, iproto::KEY_KEY)?;
            write_key(buf, key)?;
            rmp::encode::write_uint(buf, iproto::KEY_TUPLE)?;
            rmp::encode::write_array_len(buf, ops.len() as u32)?;
            for op in ops {
                match op {
                    UpdateOp::Assign { field, value } => {
                        rmp::encode::write_array_len(buf, 3)?;
                        rmp::encode::write_str(buf, "=")?;
                        rmp::encode::write_uint(buf, *field as u64)?;
                        rmp::encode::write_bin(buf, value)?;
                    }
                }
            }
        }
        Request::Delete { space_id, key } => {
            rmp::encode::write_map_len(buf, 3)?;
            rmp::encode::write_uint(buf, iproto::KEY_SPACE_ID)?;
            rmp::encode::write_uint(buf, *space_id as u64)?;
            rmp::encode::write_uint(buf, iproto::KEY_INDEX_ID)?;
            rmp::encode::write_uint(buf, 0)?;
            rmp::encode::write_uint(buf, iproto::KEY_KEY)?;
            write_key(buf, key)?;
        }
    }
    Ok(())
}

/// Encode a request to bytes
///
/// Format: size + {REQUEST_TYPE, SYNC} + body
pub fn encode_request(sync: u64, request: &Request) -> Result<Vec<u8>> {
    let mut payload = Vec::with_capacity(64);

    rmp::encode::write_map_len(&mut payload, 2)?;
    rmp::encode::write_uint(&mut payload, iproto::KEY_REQUEST_TYPE)?;
    rmp::encode::write_uint(&mut payload, request.request_type() as u64)?;
    rmp::encode::write_uint(&mut payload, iproto::KEY_SYNC)?;
    rmp::encode::write_uint(&mut payload, sync)?;

    write_request_body(&mut payload, request)?;
    frame(payload)
}

/// Decode a request packet (without its size prefix)
///
/// Returns the sync id and the request.
pub fn decode_request(packet: &[u8]) -> Result<(u64, Request)> {
    let mut rd = packet;
    let mut request_type = None;
    let mut sync = 0;

    let header_len = rmp::decode::read_map_len(&mut rd)?;
    for _ in 0..header_len {
        let key: u64 = rmp::decode::read_int(&mut rd)?;
        match key {
            iproto::KEY_REQUEST_TYPE => request_type = Some(rmp::decode::read_int::<u32, _>(&mut rd)?),
            iproto::KEY_SYNC => sync = rmp::decode::read_int(&mut rd)?,
            _ => {
                rmpv::decode::read_value_ref(&mut rd)?;
            }
        }
    }

    let request_type = request_type
        .ok_or_else(|| KvError::Protocol("request header has no type".to_string()))?;
    let body = rd;

    let request = match request_type {
        iproto::REQUEST_PING => Request::Ping,
        iproto::REQUEST_AUTH => {
            let user = read_string(&mut required_field(body, iproto::KEY_USER_NAME)?)?;
            let mut tuple = required_field(body, iproto::KEY_TUPLE)?;
            let parts = rmp::decode::read_array_len(&mut tuple)?;
            if parts != 2 {
                return Err(KvError::Protocol(format!(
                    "auth tuple has {} parts, expected 2",
                    parts
                )));
            }
            let mechanism = read_string(&mut tuple)?;
            if mechanism != iproto::CHAP_SHA1 {
                return Err(KvError::Protocol(format!(
                    "unsupported auth mechanism: {}",
                    mechanism
                )));
            }
            let scramble = read_bytes(&mut tuple)?;
            Request::Auth { user, scramble }
        }
        iproto::REQUEST_SELECT => Request::Select {
            space_id: read_uint(required_field(body, iproto::KEY_SPACE_ID)?)? as u32,
            index_id: match map_field(body, iproto::KEY_INDEX_ID)? {
                Some(raw) => read_uint(raw)? as u32,
                None => 0,
            },
            key: read_key(required_field(body, iproto::KEY_KEY)?)?,
            limit: match map_field(body, iproto::KEY_LIMIT)? {
                Some(raw) => read_uint(raw)? as u32,
                None => u32::MAX,
            },
        },
        iproto::REQUEST_INSERT => Request::Insert {
            space_id: read_uint(required_field(body, iproto::KEY_SPACE_ID)?)? as u32,
            record: decode_record(required_field(body, iproto::KEY_TUPLE)?)?,
        },
        iproto::REQUEST_UPDATE => {
            let space_id = read_uint(required_field(body, iproto::KEY_SPACE_ID)?)? as u32;
            let key = read_key(required_field(body, iproto::KEY_KEY)?)?;

            let mut raw_ops = required_field(body, iproto::KEY_TUPLE)?;
            let count = rmp::decode::read_array_len(&mut raw_ops)?;
            let mut ops = Vec::new();
            for _ in 0..count {
                let parts = rmp::decode::read_array_len(&mut raw_ops)?;
                let op = read_string(&mut raw_ops)?;
                if op != "=" || parts != 3 {
                    return Err(KvError::Protocol(format!(
                        "unsupported update operation '{}' with {} parts",
                        op, parts
                    )));
                }
                let field: u32 = rmp::decode::read_int(&mut raw_ops)?;
                let value = read_bytes(&mut raw_ops)?;
                ops.push(UpdateOp::Assign { field, value });
            }

            Request::Update { space_id, key, ops }
        }
        iproto::REQUEST_DELETE => Request::Delete {
            space_id: read_uint(required_field(body, iproto::KEY_SPACE_ID)?)? as u32,
            key: read_key(required_field(body, iproto::KEY_KEY)?)?,
        },
        other => {
            return Err(KvError::Protocol(format!(
                "Unknown request type: 0x{:02x}",
                other
            )))
        }
    };

    Ok((sync, request))
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
///
/// Format: size + {CODE, SYNC, SCHEMA_VERSION} + body
pub fn encode_response(response: &Response) -> Result<Vec<u8>> {
    let mut payload = Vec::with_capacity(16 + response.body.len());

    rmp::encode::write_map_len(&mut payload, 3)?;
    rmp::encode::write_uint(&mut payload, iproto::KEY_REQUEST_TYPE)?;
    rmp::encode::write_uint(&mut payload, response.header.code as u64)?;
    rmp::encode::write_uint(&mut payload, iproto::KEY_SYNC)?;
    rmp::encode::write_uint(&mut payload, response.header.sync)?;
    rmp::encode::write_uint(&mut payload, iproto::KEY_SCHEMA_VERSION)?;
    rmp::encode::write_uint(&mut payload, response.header.schema_version)?;
    payload.extend_from_slice(&response.body);

    frame(payload)
}

/// Decode a response packet (without its size prefix)
pub fn decode_response(packet: Bytes) -> Result<Response> {
    let mut header = ResponseHeader::default();
    let mut rd: &[u8] = &packet;

    let header_len = rmp::decode::read_map_len(&mut rd)?;
    for _ in 0..header_len {
        let key: u64 = rmp::decode::read_int(&mut rd)?;
        match key {
            iproto::KEY_REQUEST_TYPE => header.code = rmp::decode::read_int(&mut rd)?,
            iproto::KEY_SYNC => header.sync = rmp::decode::read_int(&mut rd)?,
            iproto::KEY_SCHEMA_VERSION => header.schema_version = rmp::decode::read_int(&mut rd)?,
            _ => {
                rmpv::decode::read_value_ref(&mut rd)?;
            }
        }
    }

    let body_start = packet.len() - rd.len();
    Ok(Response::new(header, packet.slice(body_start..)))
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Write a request to a stream
pub fn write_request<W: Write>(writer: &mut W, sync: u64, request: &Request) -> Result<()> {
    let bytes = encode_request(sync, request)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read a complete request from a stream
///
/// Blocks until a complete packet is received or an error occurs
pub fn read_request<R: Read>(reader: &mut R) -> Result<(u64, Request)> {
    let packet = read_packet(reader)?;
    decode_request(&packet)
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    let bytes = encode_response(response)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read a complete response from a stream
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    let packet = read_packet(reader)?;
    decode_response(packet)
}
