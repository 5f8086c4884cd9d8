//! Challenge model (§3, §4.3)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A time-bounded secret minted for one session that a participant's signed
/// response must echo exactly.
///
/// Immutable once issued. Reissuing for the same `session_id` overwrites the
/// prior challenge in the `EvidenceStore` (the issuer logs this).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Challenge {
    pub session_id: String,
    /// URL-safe base64 text on the wire; at least 32 random bytes.
    pub challenge_code: String,
    /// URL-safe base64 text on the wire; at least 16 random bytes.
    pub nonce: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub organiser_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Challenge {
    /// Whether `at` falls within `[issued_at, expires_at]`, inclusive on both ends.
    pub fn is_within_validity(&self, at: DateTime<Utc>) -> bool {
        at >= self.issued_at && at <= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample() -> Challenge {
        Challenge {
            session_id: "s1".into(),
            challenge_code: "code".into(),
            nonce: "nonce".into(),
            issued_at: Utc::now(),
            expires_at: Utc::now() + Duration::seconds(15),
            organiser_id: "org1".into(),
            metadata: None,
        }
    }

    #[test]
    fn validity_window_is_inclusive_at_both_ends() {
        let c = sample();
        assert!(c.is_within_validity(c.issued_at));
        assert!(c.is_within_validity(c.expires_at));
        assert!(!c.is_within_validity(c.expires_at + Duration::milliseconds(1)));
        assert!(!c.is_within_validity(c.issued_at - Duration::milliseconds(1)));
    }
}
