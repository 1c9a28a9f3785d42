//! Network Module
//!
//! Session with the storage engine.
//!
//! ## Architecture
//! - One TCP connection per process, shared by all request threads
//! - Requests pipelined by sync id, responses demultiplexed by a reader thread
//! - [`Session`] is the seam the repository depends on, so it can run
//!   against an in-memory engine in tests

mod connection;

pub use connection::{Connection, Credentials};

use crate::error::{KvError, Result};
use crate::protocol::{iproto, Request, Response};

/// A request/response session with the engine
///
/// Implementations must be safe to call from many threads at once.
pub trait Session: Send + Sync {
    /// Send one request and wait for its response
    ///
    /// Engine-reported errors are returned as an `Ok` response with an error
    /// header; `Err` means the round trip itself failed.
    fn call(&self, request: Request) -> Result<Response>;

    /// Gracefully end the session
    fn close(&self) -> Result<()>;

    /// Round-trip a PING
    fn ping(&self) -> Result<()> {
        self.call(Request::Ping)?.into_result().map(|_| ())
    }
}

/// Look up a space id by name in the `_vspace` system view
///
/// Data requests address spaces by numeric id, so this runs once at startup.
pub fn resolve_space_id<S: Session + ?Sized>(session: &S, name: &str) -> Result<u32> {
    let response = session
        .call(Request::Select {
            space_id: iproto::VSPACE_ID,
            index_id: iproto::VSPACE_NAME_INDEX,
            key: name.to_string(),
            limit: 1,
        })?
        .into_result()?;

    let mut rd = response.data()?.unwrap_or_default();
    let rows = if rd.is_empty() {
        0
    } else {
        rmp::decode::read_array_len(&mut rd)?
    };
    if rows == 0 {
        return Err(KvError::SpaceNotFound(name.to_string()));
    }

    // _vspace tuple: [id, owner, name, engine, ...]
    let fields = rmp::decode::read_array_len(&mut rd)?;
    if fields == 0 {
        return Err(KvError::Protocol(format!("empty _vspace tuple for {}", name)));
    }
    Ok(rmp::decode::read_int(&mut rd)?)
}
