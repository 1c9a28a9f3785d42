//! Server greeting and chap-sha1 scramble
//!
//! On connect the engine sends a fixed 128-byte greeting:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │ "Tarantool <version> (Binary) <uuid>"   padded to 63+\n │
//! │ base64(salt)                            padded to 63+\n │
//! └────────────────────────────────────────────────────────┘
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use sha1::{Digest, Sha1};

use crate::error::{KvError, Result};

/// Total greeting size
pub const GREETING_SIZE: usize = 128;

/// Size of each greeting line, newline included
const LINE_SIZE: usize = 64;

/// Bytes of salt used by the scramble
pub const SCRAMBLE_SIZE: usize = 20;

/// Parsed server greeting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    /// First line, trimmed (e.g. `Tarantool 2.11.1 (Binary) <uuid>`)
    pub banner: String,

    /// Decoded salt
    pub salt: Vec<u8>,
}

impl Greeting {
    /// Parse the 128-byte greeting
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != GREETING_SIZE {
            return Err(KvError::Protocol(format!(
                "Greeting must be {} bytes, got {}",
                GREETING_SIZE,
                bytes.len()
            )));
        }

        let banner = String::from_utf8_lossy(&bytes[..LINE_SIZE])
            .trim_end()
            .to_string();
        if !banner.starts_with("Tarantool") {
            return Err(KvError::Protocol(format!(
                "Unexpected greeting banner: {:?}",
                banner
            )));
        }

        let salt_line = String::from_utf8_lossy(&bytes[LINE_SIZE..]);
        let salt = STANDARD
            .decode(salt_line.trim())
            .map_err(|e| KvError::Protocol(format!("Invalid greeting salt: {}", e)))?;
        if salt.len() < SCRAMBLE_SIZE {
            return Err(KvError::Protocol(format!(
                "Greeting salt too short: {} bytes",
                salt.len()
            )));
        }

        Ok(Self { banner, salt })
    }

    /// Build a greeting (server side)
    pub fn encode(banner: &str, salt: &[u8]) -> Result<[u8; GREETING_SIZE]> {
        let salt_b64 = STANDARD.encode(salt);
        if banner.len() >= LINE_SIZE || salt_b64.len() >= LINE_SIZE {
            return Err(KvError::Encode(
                "greeting line does not fit in 63 bytes".to_string(),
            ));
        }

        let mut greeting = [b' '; GREETING_SIZE];
        greeting[..banner.len()].copy_from_slice(banner.as_bytes());
        greeting[LINE_SIZE - 1] = b'\n';
        greeting[LINE_SIZE..LINE_SIZE + salt_b64.len()].copy_from_slice(salt_b64.as_bytes());
        greeting[GREETING_SIZE - 1] = b'\n';
        Ok(greeting)
    }

    /// Engine version from the banner, if present
    pub fn version(&self) -> Option<&str> {
        self.banner.split_whitespace().nth(1)
    }
}

/// Compute the chap-sha1 scramble for `password` under `salt`
///
/// `sha1(password) XOR sha1(salt[..20] ++ sha1(sha1(password)))`
pub fn scramble(salt: &[u8], password: &str) -> Result<[u8; SCRAMBLE_SIZE]> {
    if salt.len() < SCRAMBLE_SIZE {
        return Err(KvError::Auth(format!(
            "salt too short: {} bytes",
            salt.len()
        )));
    }

    let hash1 = Sha1::digest(password.as_bytes());
    let hash2 = Sha1::digest(hash1);

    let mut hasher = Sha1::new();
    hasher.update(&salt[..SCRAMBLE_SIZE]);
    hasher.update(hash2);
    let mask = hasher.finalize();

    let mut out = [0u8; SCRAMBLE_SIZE];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = hash1[i] ^ mask[i];
    }
    Ok(out)
}
