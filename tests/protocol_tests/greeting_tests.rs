//! Greeting Tests
//!
//! Tests for greeting parsing and the chap-sha1 scramble.

use kvgate::protocol::{scramble, Greeting, GREETING_SIZE, SCRAMBLE_SIZE};
use kvgate::KvError;
use sha1::{Digest, Sha1};

const BANNER: &str = "Tarantool 2.11.1 (Binary) 7b1fc8a2-3c5e-4d2a-9f61-0c4e2b8d1a77";

fn salt() -> Vec<u8> {
    (0u8..32).collect()
}

/// Check a scramble the way the engine does, knowing only sha1(sha1(password))
fn engine_accepts(salt: &[u8], stored_hash2: &[u8], scramble: &[u8]) -> bool {
    let mut hasher = Sha1::new();
    hasher.update(&salt[..SCRAMBLE_SIZE]);
    hasher.update(stored_hash2);
    let mask = hasher.finalize();

    let candidate: Vec<u8> = scramble.iter().zip(mask.iter()).map(|(a, b)| a ^ b).collect();
    Sha1::digest(&candidate).as_slice() == stored_hash2
}

// =============================================================================
// Greeting Parsing
// =============================================================================

#[test]
fn test_greeting_parse() {
    let raw = Greeting::encode(BANNER, &salt()).unwrap();
    assert_eq!(raw.len(), GREETING_SIZE);
    assert_eq!(raw[63], b'\n');
    assert_eq!(raw[127], b'\n');

    let greeting = Greeting::parse(&raw).unwrap();
    assert_eq!(greeting.banner, BANNER);
    assert_eq!(greeting.salt, salt());
    assert_eq!(greeting.version(), Some("2.11.1"));
}

#[test]
fn test_greeting_wrong_size() {
    let err = Greeting::parse(&[b' '; 64]).unwrap_err();
    assert!(matches!(err, KvError::Protocol(_)));
}

#[test]
fn test_greeting_foreign_banner() {
    let mut raw = Greeting::encode(BANNER, &salt()).unwrap();
    raw[..9].copy_from_slice(b"Memcached");

    assert!(Greeting::parse(&raw).is_err());
}

#[test]
fn test_greeting_bad_salt() {
    let mut raw = Greeting::encode(BANNER, &salt()).unwrap();
    raw[64..68].copy_from_slice(b"!!!!");

    assert!(Greeting::parse(&raw).is_err());
}

#[test]
fn test_greeting_short_salt() {
    let raw = Greeting::encode(BANNER, &[7u8; 8]).unwrap();
    assert!(Greeting::parse(&raw).is_err());
}

// =============================================================================
// Scramble
// =============================================================================

#[test]
fn test_scramble_verifies_against_stored_hash() {
    let password = "s3cret";
    let hash2 = Sha1::digest(Sha1::digest(password.as_bytes()));

    let s = scramble(&salt(), password).unwrap();
    assert!(engine_accepts(&salt(), &hash2, &s));
}

#[test]
fn test_scramble_wrong_password_rejected() {
    let hash2 = Sha1::digest(Sha1::digest(b"s3cret"));

    let s = scramble(&salt(), "guess").unwrap();
    assert!(!engine_accepts(&salt(), &hash2, &s));
}

#[test]
fn test_scramble_depends_on_salt() {
    let mut other = salt();
    other[0] ^= 0xff;

    assert_ne!(
        scramble(&salt(), "pw").unwrap(),
        scramble(&other, "pw").unwrap()
    );
}

#[test]
fn test_scramble_uses_first_20_salt_bytes() {
    let mut longer = salt();
    longer[25] ^= 0xff;

    assert_eq!(
        scramble(&salt(), "pw").unwrap(),
        scramble(&longer, "pw").unwrap()
    );
}

#[test]
fn test_scramble_short_salt() {
    let err = scramble(&[1u8; 10], "pw").unwrap_err();
    assert!(matches!(err, KvError::Auth(_)));
}
