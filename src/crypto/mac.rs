//! Keyed MAC primitive
//!
//! HMAC-SHA256 over the canonical payload encoding. Constant-time comparison
//! on verify so timing does not leak how many signature bytes matched.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

type HmacSha256 = Hmac<Sha256>;

/// Deterministic authenticated-payload primitive keyed with the process secret.
///
/// The secret is copied into this struct at construction and zeroised on
/// drop; callers should construct exactly one `KeyedMac` per process (inside
/// `PresenceEngine`) rather than re-deriving it per request.
pub struct KeyedMac {
    secret: Vec<u8>,
}

impl std::fmt::Debug for KeyedMac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedMac").field("secret", &"<redacted>").finish()
    }
}

impl KeyedMac {
    /// Constructs a MAC keyed with `secret`. `secret` must be non-empty;
    /// callers are expected to have already validated this at config load.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            secret: secret.to_vec(),
        }
    }

    /// Signs `payload` (already canonicalised by the caller) and returns the
    /// digest as lowercase hex, matching the wire format's `signature` field.
    pub fn sign(&self, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts keys of any length");
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    /// Recomputes the MAC over `payload` and compares it against `signature_hex`
    /// (lowercase or uppercase hex accepted) in constant time.
    pub fn verify(&self, payload: &[u8], signature_hex: &str) -> bool {
        let Ok(given) = hex::decode(signature_hex) else {
            return false;
        };

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts keys of any length");
        mac.update(payload);
        let expected = mac.finalize().into_bytes();

        if expected.len() != given.len() {
            return false;
        }

        bool::from(expected.as_slice().ct_eq(&given))
    }
}

impl Drop for KeyedMac {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

/// Constant-time byte-slice comparison, used by the Verifier for the
/// challenge-code and nonce equality checks (§4.4 steps 4-5), which are not
/// MAC digests but are still secret-derived and must not leak timing.
pub fn constant_time_bytes_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    bool::from(a.ct_eq(b))
}
