//! HMAC-SHA256 Request Signing
//!
//! Signs and verifies request bodies over the `v0:{timestamp}:{body}` base
//! string. Verification always works on the raw body bytes as received.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::protocol::SIGNATURE_VERSION;

type HmacSha256 = Hmac<Sha256>;

/// Compute the `v0=<hex>` signature for a request.
pub fn sign_request(secret: &[u8], timestamp: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(SIGNATURE_VERSION.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    format!(
        "{SIGNATURE_VERSION}={}",
        hex::encode(mac.finalize().into_bytes())
    )
}

/// Verify a provided signature against the locally computed one.
pub fn verify_request(secret: &[u8], timestamp: &str, body: &[u8], provided: &str) -> bool {
    let expected = sign_request(secret, timestamp, body);
    constant_time_eq(expected.as_bytes(), provided.as_bytes())
}

/// Constant-time byte comparison.
///
/// Unequal lengths return immediately without looking at content; equal
/// lengths are compared over every position.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
