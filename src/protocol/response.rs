//! Response definitions
//!
//! Represents responses from the engine. The body is kept as raw bytes and
//! only parsed on demand, so callers that just need the outcome can stop at
//! the header.

use bytes::Bytes;
use rmpv::ValueRef;

use crate::error::{KvError, Result};

use super::codec::map_field;
use super::iproto;
use super::record::{decode_records, encode_records, Record};

/// Response header fields the client cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResponseHeader {
    /// `0` on success, `0x8000 | errcode` on failure
    pub code: u32,

    /// Echo of the request's sync id
    pub sync: u64,

    /// Schema version the engine answered with
    pub schema_version: u64,
}

impl ResponseHeader {
    pub fn is_ok(&self) -> bool {
        self.code & iproto::TYPE_ERROR == 0
    }

    /// Engine error code, if the response is an error
    pub fn error_code(&self) -> Option<u32> {
        if self.is_ok() {
            None
        } else {
            Some(self.code & !iproto::TYPE_ERROR)
        }
    }
}

/// A response packet
#[derive(Debug, Clone)]
pub struct Response {
    pub header: ResponseHeader,

    /// Raw MessagePack body map
    pub body: Bytes,
}

impl Response {
    /// Create a response from a header and a raw body map
    pub fn new(header: ResponseHeader, body: Bytes) -> Self {
        Self { header, body }
    }

    /// Create an OK response with an empty body
    pub fn empty(sync: u64) -> Self {
        Self {
            header: ResponseHeader {
                code: iproto::REQUEST_OK,
                sync,
                schema_version: 0,
            },
            // fixmap with zero entries
            body: Bytes::from_static(&[0x80]),
        }
    }

    /// Create an OK response carrying records in DATA
    pub fn ok(sync: u64, records: &[Record]) -> Result<Self> {
        Self::with_data(sync, &encode_records(records)?)
    }

    /// Create an OK response whose DATA is an already encoded array
    pub fn with_data(sync: u64, data: &[u8]) -> Result<Self> {
        let mut body = Vec::with_capacity(2 + data.len());
        rmp::encode::write_map_len(&mut body, 1)?;
        rmp::encode::write_uint(&mut body, iproto::KEY_DATA)?;
        body.extend_from_slice(data);

        let mut response = Self::empty(sync);
        response.body = Bytes::from(body);
        Ok(response)
    }

    /// Create an error response with the given engine error code
    pub fn error(sync: u64, code: u32, message: &str) -> Result<Self> {
        let mut body = Vec::with_capacity(4 + message.len());
        rmp::encode::write_map_len(&mut body, 1)?;
        rmp::encode::write_uint(&mut body, iproto::KEY_ERROR_24)?;
        rmp::encode::write_str(&mut body, message)?;

        Ok(Self {
            header: ResponseHeader {
                code: iproto::TYPE_ERROR | code,
                sync,
                schema_version: 0,
            },
            body: Bytes::from(body),
        })
    }

    /// Raw bytes of a body field, if present
    fn field(&self, key: u64) -> Result<Option<&[u8]>> {
        map_field(&self.body, key)
    }

    /// Raw DATA array, if the body has one
    pub fn data(&self) -> Result<Option<&[u8]>> {
        self.field(iproto::KEY_DATA)
    }

    /// Error message reported by the engine
    pub fn error_message(&self) -> Option<String> {
        let raw = self.field(iproto::KEY_ERROR_24).ok()??;
        let mut rd = raw;
        match rmpv::decode::read_value_ref(&mut rd).ok()? {
            ValueRef::String(s) => Some(String::from_utf8_lossy(s.as_bytes()).into_owned()),
            _ => None,
        }
    }

    /// Turn an error response into `KvError::Server`
    pub fn into_result(self) -> Result<Self> {
        match self.header.error_code() {
            None => Ok(self),
            Some(code) => Err(KvError::Server {
                code,
                message: self.error_message().unwrap_or_default(),
            }),
        }
    }

    /// Decode the DATA array as records
    ///
    /// A missing DATA field decodes as an empty list; an error response
    /// yields `KvError::Server`.
    pub fn records(&self) -> Result<Vec<Record>> {
        if let Some(code) = self.header.error_code() {
            return Err(KvError::Server {
                code,
                message: self.error_message().unwrap_or_default(),
            });
        }

        match self.data()? {
            Some(data) => decode_records(data),
            None => Ok(Vec::new()),
        }
    }
}
