//! Connection Tests
//!
//! Tests for the engine connection:
//! - Greeting and chap-sha1 authentication
//! - Connect failures and timeouts
//! - Pipelined calls from many threads
//! - Request timeouts and graceful close

use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use kvgate::network::{resolve_space_id, Connection, Credentials, Session};
use kvgate::protocol::{Record, Request};
use kvgate::KvError;

use crate::common::{FakeEngine, MemoryEngine, ER_ACCESS_DENIED, SPACE_ID};

const TIMEOUT: Duration = Duration::from_secs(2);

// =============================================================================
// Helper Functions
// =============================================================================

fn guest_engine() -> FakeEngine {
    FakeEngine::start(MemoryEngine::new(), None)
}

fn connect(engine: &FakeEngine) -> Connection {
    Connection::connect(&engine.addr(), &Credentials::guest(), TIMEOUT).unwrap()
}

fn select(conn: &Connection, key: &str) -> Vec<Record> {
    conn.call(Request::select(SPACE_ID, key))
        .unwrap()
        .records()
        .unwrap()
}

// =============================================================================
// Handshake Tests
// =============================================================================

#[test]
fn test_connect_as_guest() {
    let engine = guest_engine();
    let conn = connect(&engine);

    assert!(conn.is_open());
    assert_eq!(conn.greeting().version(), Some("2.11.1"));
    conn.ping().unwrap();
    conn.close().unwrap();
}

#[test]
fn test_connect_with_credentials() {
    let credentials = Credentials::new("storage", "s3cret");
    let engine = FakeEngine::start(MemoryEngine::new(), Some(credentials.clone()));

    let conn = Connection::connect(&engine.addr(), &credentials, TIMEOUT).unwrap();
    assert_eq!(resolve_space_id(&conn, "kv_storage").unwrap(), SPACE_ID);
    conn.close().unwrap();
}

#[test]
fn test_wrong_password() {
    let engine = FakeEngine::start(
        MemoryEngine::new(),
        Some(Credentials::new("storage", "s3cret")),
    );

    let result = Connection::connect(
        &engine.addr(),
        &Credentials::new("storage", "guess"),
        TIMEOUT,
    );
    match result {
        Err(KvError::ConnectionFailed { reason, .. }) => {
            assert!(reason.contains("Authentication failed"), "reason: {}", reason)
        }
        Err(other) => panic!("Expected ConnectionFailed, got {:?}", other),
        Ok(_) => panic!("Expected ConnectionFailed, got a connection"),
    }
}

#[test]
fn test_guest_on_protected_engine() {
    let engine = FakeEngine::start(
        MemoryEngine::new(),
        Some(Credentials::new("storage", "s3cret")),
    );

    // the handshake succeeds, the first request is denied
    let conn = connect(&engine);
    let err = resolve_space_id(&conn, "kv_storage").unwrap_err();
    assert!(matches!(err, KvError::Server { code, .. } if code == ER_ACCESS_DENIED));
}

#[test]
fn test_connection_refused() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().to_string()
    };

    let err = Connection::connect(&addr, &Credentials::guest(), TIMEOUT).unwrap_err();
    assert!(matches!(err, KvError::ConnectionFailed { .. }));
}

#[test]
fn test_silent_server_times_out() {
    // accepts TCP but never sends a greeting
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let start = Instant::now();
    let err = Connection::connect(&addr, &Credentials::guest(), Duration::from_millis(200))
        .unwrap_err();

    assert!(matches!(err, KvError::ConnectionFailed { .. }));
    assert!(start.elapsed() < TIMEOUT);
    drop(listener);
}

// =============================================================================
// Space Resolution Tests
// =============================================================================

#[test]
fn test_resolve_space_id() {
    let engine = guest_engine();
    let conn = connect(&engine);

    assert_eq!(resolve_space_id(&conn, "kv_storage").unwrap(), SPACE_ID);
    assert!(matches!(
        resolve_space_id(&conn, "missing"),
        Err(KvError::SpaceNotFound(name)) if name == "missing"
    ));
}

// =============================================================================
// Pipelining Tests
// =============================================================================

#[test]
fn test_fast_request_not_blocked_by_slow_one() {
    let engine = guest_engine();
    engine.engine().put("slow", b"1");
    engine.engine().put("fast", b"2");
    engine.engine().slow_down("slow", Duration::from_millis(400));

    let conn = connect(&engine);

    thread::scope(|s| {
        let slow = s.spawn(|| select(&conn, "slow"));

        thread::sleep(Duration::from_millis(50));
        let start = Instant::now();
        let fast = select(&conn, "fast");
        assert!(start.elapsed() < Duration::from_millis(300));
        assert_eq!(fast, vec![Record::new("fast", b"2".to_vec())]);

        assert_eq!(slow.join().unwrap(), vec![Record::new("slow", b"1".to_vec())]);
    });
}

#[test]
fn test_many_threads_share_one_connection() {
    let engine = guest_engine();
    let conn = Arc::new(connect(&engine));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let conn = Arc::clone(&conn);
            thread::spawn(move || {
                for i in 0..25 {
                    let key = format!("t{}:{}", t, i);
                    let response = conn
                        .call(Request::Insert {
                            space_id: SPACE_ID,
                            record: Record::new(key.clone(), key.clone().into_bytes()),
                        })
                        .unwrap();
                    assert!(response.header.is_ok());

                    let records = response.records().unwrap();
                    assert_eq!(records[0].key, key);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(engine.engine().len(), 200);
}

// =============================================================================
// Timeout and Lifecycle Tests
// =============================================================================

#[test]
fn test_request_timeout() {
    let engine = guest_engine();
    engine.engine().slow_down("slow", Duration::from_millis(500));

    let conn = Connection::connect_with(
        &engine.addr(),
        &Credentials::guest(),
        TIMEOUT,
        Some(Duration::from_millis(100)),
    )
    .unwrap();

    let err = conn.call(Request::select(SPACE_ID, "slow")).unwrap_err();
    assert!(matches!(err, KvError::Timeout));

    // the late response is discarded, the connection stays usable
    conn.ping().unwrap();
    thread::sleep(Duration::from_millis(500));
    conn.ping().unwrap();
}

#[test]
fn test_close_once() {
    let engine = guest_engine();
    let conn = connect(&engine);

    conn.close().unwrap();
    assert!(!conn.is_open());
    assert!(matches!(conn.close(), Err(KvError::ConnectionClosed)));
    assert!(matches!(
        conn.call(Request::Ping),
        Err(KvError::ConnectionClosed)
    ));
}

#[test]
fn test_close_waits_for_in_flight_requests() {
    let engine = guest_engine();
    engine.engine().put("slow", b"1");
    engine.engine().slow_down("slow", Duration::from_millis(200));

    let conn = connect(&engine);

    thread::scope(|s| {
        let in_flight = s.spawn(|| conn.call(Request::select(SPACE_ID, "slow")));

        thread::sleep(Duration::from_millis(50));
        conn.close().unwrap();

        let response = in_flight.join().unwrap().unwrap();
        assert_eq!(response.records().unwrap().len(), 1);
    });
}

#[test]
fn test_engine_drops_connection() {
    let engine = guest_engine();
    let conn = connect(&engine);
    conn.ping().unwrap();

    engine.drop_connections();

    let deadline = Instant::now() + TIMEOUT;
    while conn.is_open() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }

    assert!(!conn.is_open());
    assert!(conn.call(Request::Ping).is_err());
    assert!(matches!(conn.close(), Err(KvError::ConnectionClosed)));
}
