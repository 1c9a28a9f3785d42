//! Record tuple codec
//!
//! A record travels as the fixed 2-element MessagePack array
//! `[key: str, value: bin]`. The value is carried as opaque bytes; its JSON
//! is never parsed here, so unknown keys and formatting survive untouched.

use std::io::Write;

use rmpv::ValueRef;

use crate::error::{KvError, Result};

/// Number of fields in the `[key, value]` tuple
pub const RECORD_FIELDS: u32 = 2;

/// Tuple position of the value field
pub const VALUE_FIELD: u32 = 1;

/// A key with its opaque JSON payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Primary key
    pub key: String,

    /// Raw JSON bytes, never interpreted by the storage layer
    pub value: Vec<u8>,
}

impl Record {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Byte length of the value payload
    pub fn size(&self) -> usize {
        self.value.len()
    }
}

// =============================================================================
// Encoding
// =============================================================================

/// Write a record as a `[key, value]` tuple
pub fn write_record<W: Write>(wr: &mut W, record: &Record) -> Result<()> {
    rmp::encode::write_array_len(wr, RECORD_FIELDS)?;
    rmp::encode::write_str(wr, &record.key)?;
    rmp::encode::write_bin(wr, &record.value)?;
    Ok(())
}

/// Encode a record to bytes
pub fn encode_record(record: &Record) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(16 + record.key.len() + record.value.len());
    write_record(&mut buf, record)?;
    Ok(buf)
}

/// Encode a list of records as a MessagePack array (the DATA of a response)
pub fn encode_records(records: &[Record]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    rmp::encode::write_array_len(&mut buf, records.len() as u32)?;
    for record in records {
        write_record(&mut buf, record)?;
    }
    Ok(buf)
}

// =============================================================================
// Decoding
// =============================================================================

/// Read one `[key, value]` tuple, advancing the slice past it
///
/// Fails with `MalformedRecord` before reading any field when the tuple
/// does not hold exactly two elements.
pub fn read_record(rd: &mut &[u8]) -> Result<Record> {
    let len = rmp::decode::read_array_len(rd)?;
    if len != RECORD_FIELDS {
        return Err(KvError::MalformedRecord { len });
    }

    let key = match rmpv::decode::read_value_ref(rd)? {
        ValueRef::String(s) => s
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| KvError::Protocol("record key is not valid UTF-8".to_string()))?,
        other => {
            return Err(KvError::Protocol(format!(
                "record key must be a string, got {}",
                other
            )))
        }
    };

    // Tuples written by other clients may hold the value as str
    let value = match rmpv::decode::read_value_ref(rd)? {
        ValueRef::Binary(bytes) => bytes.to_vec(),
        ValueRef::String(s) => s.as_bytes().to_vec(),
        other => {
            return Err(KvError::Protocol(format!(
                "record value must be binary, got {}",
                other
            )))
        }
    };

    Ok(Record { key, value })
}

/// Decode a single record, rejecting trailing bytes
pub fn decode_record(bytes: &[u8]) -> Result<Record> {
    let mut rd = bytes;
    let record = read_record(&mut rd)?;
    if !rd.is_empty() {
        return Err(KvError::Protocol(format!(
            "{} trailing bytes after record",
            rd.len()
        )));
    }
    Ok(record)
}

/// Decode a MessagePack array of records
pub fn decode_records(bytes: &[u8]) -> Result<Vec<Record>> {
    let mut rd = bytes;
    let count = rmp::decode::read_array_len(&mut rd)?;

    // Each tuple takes at least one byte, so the remaining input bounds the count
    let mut records = Vec::with_capacity((count as usize).min(rd.len()));
    for _ in 0..count {
        records.push(read_record(&mut rd)?);
    }
    Ok(records)
}
