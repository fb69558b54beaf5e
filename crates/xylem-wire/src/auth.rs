//! Challenge/response credential digest.
//!
//! On accept the server greets the client with a random nonce; the client
//! proves knowledge of the password by answering with a digest of it that
//! is bound to that nonce. The password itself never crosses the wire, and
//! a captured digest cannot be replayed against a later connection.

use sha2::{Digest, Sha256};

/// Computes the digest the client sends in an `Auth` request.
///
/// ```text
/// digest = hex(sha256( hex(sha256(password)) ++ nonce ))
/// ```
///
/// The server stores (or derives) `hex(sha256(password))` and performs the
/// same outer hash with the nonce it issued.
pub fn credential_digest(password: &str, nonce: &[u8]) -> String {
    let password_hash = hex(Sha256::digest(password.as_bytes()).as_slice());

    let mut outer = Sha256::new();
    outer.update(password_hash.as_bytes());
    outer.update(nonce);
    hex(outer.finalize().as_slice())
}

fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

#[cfg(test)]
mod auth_tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        let a = credential_digest("admin", b"nonce-1");
        let b = credential_digest("admin", b"nonce-1");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn digest_is_bound_to_the_nonce() {
        let a = credential_digest("admin", b"nonce-1");
        let b = credential_digest("admin", b"nonce-2");
        assert_ne!(a, b);
    }

    #[test]
    fn digest_is_bound_to_the_password() {
        let a = credential_digest("admin", b"nonce-1");
        let b = credential_digest("hunter2", b"nonce-1");
        assert_ne!(a, b);
    }
}
