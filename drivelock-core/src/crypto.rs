//! Password fingerprints for the reuse check
//!
//! Password history never holds the password itself. Instead the change-password flow stores
//! a SHA256 fingerprint salted with the account identifier, so identical passwords on two
//! accounts produce different entries, and compares fingerprints in constant time.
//!
//! A fingerprint is only a reuse marker for the local history. It is not a credential and
//! must not be sent anywhere as one.

use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Prefix that marks a history entry as a fingerprint rather than an opaque value.
pub const FINGERPRINT_PREFIX: &str = "pwf_";

/// Compute the history fingerprint of `password` for `email`.
///
/// # Returns
///
/// `pwf_` followed by the URL-safe base64 encoding of `SHA256(email ":" password)`.
pub fn password_fingerprint(email: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();
    format!("{FINGERPRINT_PREFIX}{}", BASE64_URL_SAFE_NO_PAD.encode(digest))
}

/// Hex-encoded SHA256 of an arbitrary value, used for log-safe identifiers.
pub fn hash_for_log(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    hex::encode(&digest[..8])
}

/// Perform constant-time comparison of two byte slices.
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
