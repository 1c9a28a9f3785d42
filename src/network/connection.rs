//! Engine Connection
//!
//! Owns the single long-lived, authenticated session to the engine.
//!
//! ## Request Pipelining
//! Any number of threads may call [`Connection::call`] at once. Each request
//! gets a unique sync id and a one-shot channel; a dedicated reader thread
//! matches responses to waiting callers by sync id, so requests never wait
//! for each other's round trips.
//!
//! ## Lifecycle
//! `connect` → many `call`s → exactly one `close`. Dropping an open
//! connection closes it.

use std::collections::HashMap;
use std::io::{BufReader, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use parking_lot::{Condvar, Mutex};

use crate::error::{KvError, Result};
use crate::protocol::{
    encode_request, read_response, scramble, write_request, Greeting, Request, Response,
    GREETING_SIZE,
};

use super::Session;

const STATE_OPEN: u8 = 0;
const STATE_CLOSING: u8 = 1;
const STATE_CLOSED: u8 = 2;
/// Reader thread hit an error; no further responses will arrive
const STATE_BROKEN: u8 = 3;

/// User name and password for chap-sha1 authentication
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    /// Anonymous session, no AUTH request is sent
    pub fn guest() -> Self {
        Self::default()
    }

    pub fn is_guest(&self) -> bool {
        self.user.is_empty()
    }
}

type Pending = HashMap<u64, Sender<Result<Response>>>;

/// State shared with the reader thread
#[derive(Debug)]
struct Shared {
    /// Write half; one packet is written at a time
    writer: Mutex<TcpStream>,

    /// Callers waiting for a response, by sync id
    pending: Mutex<Pending>,

    /// Signalled whenever `pending` becomes empty
    drained: Condvar,

    state: AtomicU8,

    /// Peer address for logging
    peer_addr: String,
}

impl Shared {
    fn send(&self, packet: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.write_all(packet)?;
        writer.flush()?;
        Ok(())
    }

    /// Hand a response to the caller waiting on its sync id
    fn complete(&self, response: Response) {
        let sync = response.header.sync;
        let waiter = {
            let mut pending = self.pending.lock();
            let waiter = pending.remove(&sync);
            if pending.is_empty() {
                self.drained.notify_all();
            }
            waiter
        };

        match waiter {
            Some(tx) => {
                let _ = tx.send(Ok(response));
            }
            None => tracing::debug!(
                "Dropping response from {} for abandoned sync {}",
                self.peer_addr,
                sync
            ),
        }
    }

    /// Remove a caller that gave up waiting
    fn forget(&self, sync: u64) {
        let mut pending = self.pending.lock();
        pending.remove(&sync);
        if pending.is_empty() {
            self.drained.notify_all();
        }
    }

    /// Fail every waiting caller; called once the reader can no longer read
    fn fail_all(&self) {
        let mut pending = self.pending.lock();
        let _ = self.state.compare_exchange(
            STATE_OPEN,
            STATE_BROKEN,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        for (_, tx) in pending.drain() {
            let _ = tx.send(Err(KvError::ConnectionClosed));
        }
        self.drained.notify_all();
    }
}

/// An authenticated, pipelined connection to the engine
#[derive(Debug)]
pub struct Connection {
    shared: Arc<Shared>,

    /// Reader thread, joined on close
    reader: Mutex<Option<JoinHandle<()>>>,

    /// Next sync id (0 is used by the handshake)
    next_sync: AtomicU64,

    /// Greeting received on connect
    greeting: Greeting,

    /// Per-request timeout, `None` waits forever
    request_timeout: Option<Duration>,
}

impl Connection {
    /// Connect and authenticate within `timeout`
    ///
    /// No retries: any failure yields `KvError::ConnectionFailed`.
    pub fn connect(addr: &str, credentials: &Credentials, timeout: Duration) -> Result<Self> {
        Self::connect_with(addr, credentials, timeout, None)
    }

    /// Like [`Connection::connect`], with a per-request timeout
    pub fn connect_with(
        addr: &str,
        credentials: &Credentials,
        timeout: Duration,
        request_timeout: Option<Duration>,
    ) -> Result<Self> {
        let deadline = Instant::now() + timeout;

        Self::establish(addr, credentials, deadline, request_timeout).map_err(|e| {
            tracing::debug!("Connection to {} failed: {}", addr, e);
            KvError::ConnectionFailed {
                addr: addr.to_string(),
                reason: e.to_string(),
            }
        })
    }

    fn establish(
        addr: &str,
        credentials: &Credentials,
        deadline: Instant,
        request_timeout: Option<Duration>,
    ) -> Result<Self> {
        // Step 1: Open TCP within the deadline
        let stream = open_stream(addr, deadline)?;
        stream.set_nodelay(true)?;

        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| addr.to_string());

        // Step 2: Read the greeting and authenticate under the same deadline
        let greeting = handshake(&stream, credentials, deadline)?;

        // Step 3: Requests from now on are bounded by request_timeout only
        stream.set_read_timeout(None)?;
        stream.set_write_timeout(None)?;

        // Step 4: Spawn the reader
        let read_stream = stream.try_clone()?;
        let shared = Arc::new(Shared {
            writer: Mutex::new(stream),
            pending: Mutex::new(HashMap::new()),
            drained: Condvar::new(),
            state: AtomicU8::new(STATE_OPEN),
            peer_addr,
        });

        let reader_shared = Arc::clone(&shared);
        let reader = thread::Builder::new()
            .name("kvgate-reader".to_string())
            .spawn(move || reader_loop(BufReader::new(read_stream), reader_shared))?;

        tracing::info!(
            "Connected to {} ({}) as {}",
            shared.peer_addr,
            greeting.banner,
            if credentials.is_guest() { "guest" } else { credentials.user.as_str() }
        );

        Ok(Self {
            shared,
            reader: Mutex::new(Some(reader)),
            next_sync: AtomicU64::new(1),
            greeting,
            request_timeout,
        })
    }

    /// Send a request and wait for its response
    ///
    /// Engine errors come back as a normal `Response` with an error header;
    /// only transport failures are returned as `Err`.
    pub fn call(&self, request: Request) -> Result<Response> {
        let sync = self.next_sync.fetch_add(1, Ordering::Relaxed);
        let packet = encode_request(sync, &request)?;
        let (tx, rx) = channel::bounded(1);

        {
            let mut pending = self.shared.pending.lock();
            if self.shared.state.load(Ordering::Acquire) != STATE_OPEN {
                return Err(KvError::ConnectionClosed);
            }
            pending.insert(sync, tx);
        }

        tracing::trace!("Sending {} sync={} to {}", request.name(), sync, self.shared.peer_addr);

        if let Err(e) = self.shared.send(&packet) {
            self.shared.forget(sync);
            return Err(e);
        }

        let outcome = match self.request_timeout {
            Some(timeout) => rx.recv_timeout(timeout).map_err(|e| match e {
                RecvTimeoutError::Timeout => KvError::Timeout,
                RecvTimeoutError::Disconnected => KvError::ConnectionClosed,
            }),
            None => rx.recv().map_err(|_| KvError::ConnectionClosed),
        };

        match outcome {
            Ok(result) => result,
            Err(e) => {
                self.shared.forget(sync);
                Err(e)
            }
        }
    }

    /// Gracefully close the connection
    ///
    /// Stops new requests, waits for in-flight ones to drain, then shuts
    /// the socket down and joins the reader. A second call returns
    /// `ConnectionClosed`.
    pub fn close(&self) -> Result<()> {
        let was_broken = {
            let mut pending = self.shared.pending.lock();
            let was_broken = match self.shared.state.compare_exchange(
                STATE_OPEN,
                STATE_CLOSING,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => false,
                Err(STATE_BROKEN) => true,
                Err(_) => return Err(KvError::ConnectionClosed),
            };

            if !pending.is_empty() {
                tracing::debug!(
                    "Waiting for {} in-flight requests to {}",
                    pending.len(),
                    self.shared.peer_addr
                );
            }
            self.shared.drained.wait_while(&mut pending, |p| !p.is_empty());
            // pin BROKEN so a second close is rejected
            self.shared.state.store(STATE_CLOSING, Ordering::Release);
            was_broken
        };

        let shutdown = self.shared.writer.lock().shutdown(Shutdown::Both);

        if let Some(handle) = self.reader.lock().take() {
            if handle.join().is_err() {
                tracing::warn!("Reader thread for {} panicked", self.shared.peer_addr);
            }
        }
        self.shared.state.store(STATE_CLOSED, Ordering::Release);

        if was_broken {
            return Err(KvError::ConnectionClosed);
        }
        match shutdown {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// True until close starts or the connection breaks
    pub fn is_open(&self) -> bool {
        self.shared.state.load(Ordering::Acquire) == STATE_OPEN
    }

    pub fn greeting(&self) -> &Greeting {
        &self.greeting
    }

    pub fn peer_addr(&self) -> &str {
        &self.shared.peer_addr
    }
}

impl Session for Connection {
    fn call(&self, request: Request) -> Result<Response> {
        Connection::call(self, request)
    }

    fn close(&self) -> Result<()> {
        Connection::close(self)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let state = self.shared.state.load(Ordering::Acquire);
        if state == STATE_OPEN || state == STATE_BROKEN {
            let _ = self.close();
        }
    }
}

// =============================================================================
// Handshake
// =============================================================================

/// Time left until `deadline`, or `Timeout` once it has passed
fn remaining(deadline: Instant) -> Result<Duration> {
    deadline
        .checked_duration_since(Instant::now())
        .filter(|d| !d.is_zero())
        .ok_or(KvError::Timeout)
}

/// Try each resolved address until one connects
fn open_stream(addr: &str, deadline: Instant) -> Result<TcpStream> {
    let mut last_err = None;

    for sock_addr in addr.to_socket_addrs()? {
        match TcpStream::connect_timeout(&sock_addr, remaining(deadline)?) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }

    Err(match last_err {
        Some(e) => e.into(),
        None => KvError::Config(format!("{} resolved to no addresses", addr)),
    })
}

/// Read the greeting and, unless guest, authenticate
fn handshake(stream: &TcpStream, credentials: &Credentials, deadline: Instant) -> Result<Greeting> {
    let mut reader = stream;
    let mut writer = stream;

    stream.set_read_timeout(Some(remaining(deadline)?))?;
    stream.set_write_timeout(Some(remaining(deadline)?))?;

    let mut raw = [0u8; GREETING_SIZE];
    reader.read_exact(&mut raw)?;
    let greeting = Greeting::parse(&raw)?;

    if credentials.is_guest() {
        return Ok(greeting);
    }

    let request = Request::Auth {
        user: credentials.user.clone(),
        scramble: scramble(&greeting.salt, &credentials.password)?.to_vec(),
    };
    write_request(&mut writer, 0, &request)?;

    stream.set_read_timeout(Some(remaining(deadline)?))?;
    let response = read_response(&mut reader)?;
    if let Some(code) = response.header.error_code() {
        return Err(KvError::Auth(format!(
            "{} (code {})",
            response.error_message().unwrap_or_default(),
            code
        )));
    }

    Ok(greeting)
}

// =============================================================================
// Reader Thread
// =============================================================================

fn reader_loop(mut reader: BufReader<TcpStream>, shared: Arc<Shared>) {
    loop {
        match read_response(&mut reader) {
            Ok(response) => shared.complete(response),
            Err(e) => {
                if shared.state.load(Ordering::Acquire) == STATE_OPEN {
                    tracing::warn!("Connection to {} lost: {}", shared.peer_addr, e);
                } else {
                    tracing::debug!("Reader for {} stopped: {}", shared.peer_addr, e);
                }
                shared.fail_all();
                return;
            }
        }
    }
}
