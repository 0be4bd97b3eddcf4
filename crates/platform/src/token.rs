//! Secure Token Generation
//!
//! Opaque bearer tokens (session hashes, action tokens) must be drawn from
//! a cryptographically secure source. The source is injectable so tests can
//! substitute a deterministic byte stream.

use rand::RngCore;
use rand::rngs::OsRng;

/// Length of a session bearer token (lowercase hex characters)
pub const SESSION_HASH_LENGTH: usize = 40;

/// Length of an action token (alphanumeric characters)
pub const ACTION_TOKEN_LENGTH: usize = 20;

const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Source of cryptographically secure random bytes
pub trait TokenSource: Send + Sync {
    fn fill_bytes(&self, dest: &mut [u8]);
}

/// Production token source backed by the operating system CSPRNG
#[derive(Debug, Clone, Copy, Default)]
pub struct OsTokenSource;

impl TokenSource for OsTokenSource {
    fn fill_bytes(&self, dest: &mut [u8]) {
        OsRng.fill_bytes(dest);
    }
}

/// Generate a session hash: `SESSION_HASH_LENGTH` lowercase hex characters
pub fn session_hash(source: &dyn TokenSource) -> String {
    let mut bytes = vec![0u8; SESSION_HASH_LENGTH / 2];
    source.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Generate an action token: `len` alphanumeric characters
///
/// Uses rejection sampling over a 6-bit mask so every character of the
/// 62-symbol alphabet is equally likely.
pub fn alphanumeric_token(source: &dyn TokenSource, len: usize) -> String {
    let mut out = String::with_capacity(len);
    let mut buf = [0u8; 64];

    while out.len() < len {
        source.fill_bytes(&mut buf);
        for byte in buf {
            let index = (byte & 0x3f) as usize;
            if index < ALPHANUMERIC.len() {
                out.push(ALPHANUMERIC[index] as char);
                if out.len() == len {
                    break;
                }
            }
        }
    }

    out
}
