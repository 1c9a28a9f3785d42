//! KV Repository Tests
//!
//! Tests for CRUD semantics and outcome classification:
//! - Success paths return the stored record
//! - Duplicate inserts and missing keys map to client errors
//! - Engine, decode and transport failures map to operation errors

use std::sync::Arc;

use kvgate::network::Session;
use kvgate::protocol::iproto::{ER_NO_SUCH_SPACE, ER_TUPLE_FOUND};
use kvgate::protocol::{Request, ResponseHeader, UpdateOp};
use kvgate::repository::{classify_insert_outcome, KvRepository, RepositoryError};
use kvgate::KvError;

use crate::common::{memory_repository, Fault, MemoryEngine, MemorySession, SPACE_ID};

/// Some unrelated engine failure
const ER_MEMORY_ISSUE: u32 = 2;

// =============================================================================
// Insert Outcome Classification
// =============================================================================

#[test]
fn test_classify_ok_header() {
    let header = ResponseHeader::default();
    assert!(classify_insert_outcome(Ok(&header)).is_ok());
}

#[test]
fn test_classify_duplicate_key() {
    let header = ResponseHeader {
        code: 0x8000 | ER_TUPLE_FOUND,
        ..Default::default()
    };
    assert!(matches!(
        classify_insert_outcome(Ok(&header)),
        Err(RepositoryError::AlreadyExists)
    ));
}

#[test]
fn test_classify_other_engine_error() {
    let header = ResponseHeader {
        code: 0x8000 | ER_NO_SUCH_SPACE,
        ..Default::default()
    };
    assert!(matches!(
        classify_insert_outcome(Ok(&header)),
        Err(RepositoryError::InsertOperationFailed)
    ));
}

#[test]
fn test_classify_transport_error() {
    let err = KvError::Timeout;
    assert!(matches!(
        classify_insert_outcome(Err(&err)),
        Err(RepositoryError::InsertOperationFailed)
    ));
}

// =============================================================================
// Insert Tests
// =============================================================================

#[test]
fn test_insert_new_key() {
    let (engine, repo) = memory_repository();

    let record = repo.insert("user:1", br#"{"name":"a"}"#).unwrap();
    assert_eq!(record.key, "user:1");
    assert_eq!(record.size(), 12);
    assert_eq!(engine.get("user:1").unwrap(), br#"{"name":"a"}"#);
}

#[test]
fn test_insert_duplicate_keeps_original() {
    let (engine, repo) = memory_repository();
    repo.insert("k", b"1").unwrap();

    assert!(matches!(
        repo.insert("k", b"2"),
        Err(RepositoryError::AlreadyExists)
    ));
    assert_eq!(engine.get("k").unwrap(), b"1");
}

#[test]
fn test_insert_engine_failure() {
    let (engine, repo) = memory_repository();
    engine.set_fault(Some(Fault::Engine(ER_MEMORY_ISSUE)));

    assert!(matches!(
        repo.insert("k", b"1"),
        Err(RepositoryError::InsertOperationFailed)
    ));
}

#[test]
fn test_insert_transport_failure() {
    let (engine, repo) = memory_repository();
    engine.set_fault(Some(Fault::Transport));

    assert!(matches!(
        repo.insert("k", b"1"),
        Err(RepositoryError::InsertOperationFailed)
    ));
}

#[test]
fn test_insert_ignores_undecodable_body() {
    // only the header decides an insert
    let (engine, repo) = memory_repository();
    engine.set_fault(Some(Fault::Malformed));

    assert!(repo.insert("k", b"1").is_ok());
}

// =============================================================================
// Select Tests
// =============================================================================

#[test]
fn test_select_existing() {
    let (engine, repo) = memory_repository();
    engine.put("k", b"[1,2,3]");

    let record = repo.select("k").unwrap();
    assert_eq!(record.value, b"[1,2,3]");
}

#[test]
fn test_select_missing() {
    let (_engine, repo) = memory_repository();
    assert!(matches!(repo.select("nope"), Err(RepositoryError::NotFound)));
}

#[test]
fn test_select_engine_failure() {
    let (engine, repo) = memory_repository();
    engine.set_fault(Some(Fault::Engine(ER_MEMORY_ISSUE)));

    assert!(matches!(
        repo.select("k"),
        Err(RepositoryError::SelectOperationFailed)
    ));
}

#[test]
fn test_select_malformed_tuple() {
    let (engine, repo) = memory_repository();
    engine.set_fault(Some(Fault::Malformed));

    assert!(matches!(
        repo.select("k"),
        Err(RepositoryError::SelectOperationFailed)
    ));
}

#[test]
fn test_select_transport_failure() {
    let (engine, repo) = memory_repository();
    engine.set_fault(Some(Fault::Transport));

    assert!(matches!(
        repo.select("k"),
        Err(RepositoryError::Transport(KvError::Io(_)))
    ));
}

// =============================================================================
// Update Tests
// =============================================================================

#[test]
fn test_update_existing() {
    let (engine, repo) = memory_repository();
    engine.put("k", b"1");

    let record = repo.update("k", br#"{"v":2}"#).unwrap();
    assert_eq!(record.key, "k");
    assert_eq!(record.value, br#"{"v":2}"#);
    assert_eq!(engine.get("k").unwrap(), br#"{"v":2}"#);
}

#[test]
fn test_update_only_assigns_value_field() {
    let (engine, repo) = memory_repository();
    engine.put("k", b"1");
    repo.update("k", b"2").unwrap();

    let last = engine.requests().pop().unwrap();
    assert_eq!(
        last,
        Request::Update {
            space_id: SPACE_ID,
            key: "k".to_string(),
            ops: vec![UpdateOp::Assign {
                field: 1,
                value: b"2".to_vec()
            }],
        }
    );
}

#[test]
fn test_update_missing() {
    let (engine, repo) = memory_repository();

    assert!(matches!(
        repo.update("nope", b"1"),
        Err(RepositoryError::NotFound)
    ));
    assert!(engine.get("nope").is_none());
}

#[test]
fn test_update_failures() {
    for fault in [
        Fault::Engine(ER_MEMORY_ISSUE),
        Fault::Malformed,
        Fault::Transport,
    ] {
        let (engine, repo) = memory_repository();
        engine.put("k", b"1");
        engine.set_fault(Some(fault));

        assert!(
            matches!(
                repo.update("k", b"2"),
                Err(RepositoryError::UpdateOperationFailed)
            ),
            "fault {:?}",
            fault
        );
    }
}

// =============================================================================
// Delete Tests
// =============================================================================

#[test]
fn test_delete_returns_removed_record() {
    let (engine, repo) = memory_repository();
    engine.put("k", b"\"bye\"");

    let record = repo.delete("k").unwrap();
    assert_eq!(record.value, b"\"bye\"");
    assert!(engine.get("k").is_none());
    assert!(matches!(repo.select("k"), Err(RepositoryError::NotFound)));
}

#[test]
fn test_delete_missing() {
    let (_engine, repo) = memory_repository();
    assert!(matches!(repo.delete("nope"), Err(RepositoryError::NotFound)));
}

#[test]
fn test_delete_failures() {
    for fault in [
        Fault::Engine(ER_MEMORY_ISSUE),
        Fault::Malformed,
        Fault::Transport,
    ] {
        let (engine, repo) = memory_repository();
        engine.put("k", b"1");
        engine.set_fault(Some(fault));

        assert!(
            matches!(
                repo.delete("k"),
                Err(RepositoryError::DeleteOperationFailed)
            ),
            "fault {:?}",
            fault
        );
    }
}

// =============================================================================
// Scenario Tests
// =============================================================================

#[test]
fn test_full_lifecycle() {
    let (_engine, repo) = memory_repository();

    let created = repo.insert("user:1", br#"{"name":"a"}"#).unwrap();
    assert_eq!(created.size(), 12);

    assert_eq!(repo.select("user:1").unwrap().value, br#"{"name":"a"}"#);

    let updated = repo.update("user:1", br#"{"name":"b"}"#).unwrap();
    assert_eq!(updated.value, br#"{"name":"b"}"#);

    let deleted = repo.delete("user:1").unwrap();
    assert_eq!(deleted.value, br#"{"name":"b"}"#);

    assert!(matches!(repo.select("user:1"), Err(RepositoryError::NotFound)));
}

#[test]
fn test_value_stored_verbatim() {
    let (_engine, repo) = memory_repository();
    let value = b"{ \"z\" : 1 ,\n \"a\": [true, null] }";

    repo.insert("doc", value).unwrap();
    assert_eq!(repo.select("doc").unwrap().value, value);
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_open_resolves_space_id() {
    let engine = MemoryEngine::with_space("sessions", 700);
    let repo = KvRepository::open(MemorySession::new(Arc::clone(&engine)), "sessions").unwrap();

    assert_eq!(repo.space(), "sessions");
    assert_eq!(repo.space_id(), 700);
}

#[test]
fn test_open_unknown_space() {
    let engine = MemoryEngine::new();
    let result = KvRepository::open(MemorySession::new(engine), "missing");

    assert!(matches!(
        result,
        Err(RepositoryError::ConnectionFailed(KvError::SpaceNotFound(_)))
    ));
}

#[test]
fn test_open_on_closed_session_reports_resolve_error() {
    // resolving fails and the cleanup close fails too; the caller sees the first
    let session = MemorySession::new(MemoryEngine::new());
    session.close().unwrap();

    assert!(matches!(
        KvRepository::open(session, "kv_storage"),
        Err(RepositoryError::ConnectionFailed(KvError::ConnectionClosed))
    ));
}

#[test]
fn test_close_ends_session() {
    let (_engine, repo) = memory_repository();
    repo.ping().unwrap();

    repo.close();
    assert!(repo.session().is_closed());
    assert!(matches!(
        repo.select("k"),
        Err(RepositoryError::Transport(KvError::ConnectionClosed))
    ));

    // second close only logs
    repo.close();
}

#[test]
fn test_client_error_split() {
    assert!(RepositoryError::NotFound.is_client_error());
    assert!(RepositoryError::AlreadyExists.is_client_error());
    assert!(!RepositoryError::SelectOperationFailed.is_client_error());
    assert!(!RepositoryError::Transport(KvError::Timeout).is_client_error());
}

#[test]
fn test_error_messages() {
    assert_eq!(RepositoryError::NotFound.to_string(), "404 key not found");
    assert_eq!(
        RepositoryError::AlreadyExists.to_string(),
        "409 key already exists"
    );
}

#[test]
fn test_with_space_id_skips_lookup() {
    let engine = MemoryEngine::new();
    let repo = KvRepository::with_space_id(MemorySession::new(Arc::clone(&engine)), "kv", SPACE_ID);

    assert!(engine.requests().is_empty());
    assert!(matches!(repo.select("k"), Err(RepositoryError::NotFound)));
}
