//! Response Verifier (§4.4)
//!
//! Cryptography and challenge timing only — never inspects radio, location,
//! or wifi evidence. Returns a `StructuralVerdict`, never an `Err`: even a
//! malformed blob is a structural outcome the Compositor turns into an
//! auditable `AttendanceRecord`.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::crypto::{canonical_bytes, constant_time_bytes_eq, KeyedMac};
use crate::evidence_store::{get_json, EvidenceStore};
use crate::models::Challenge;
use crate::types::decode_signed_response;

/// The authenticated fields extracted from a payload once its signature,
/// challenge code, and nonce have all been verified.
#[derive(Debug, Clone)]
pub struct TrustedFields {
    pub participant_id: String,
    pub device_id: String,
    pub session_id: String,
    pub responded_at: DateTime<Utc>,
    pub additional_data: serde_json::Map<String, serde_json::Value>,
}

/// The Verifier's pre-Analyzer judgement (§4.4, glossary).
#[derive(Debug, Clone)]
pub enum StructuralVerdict {
    /// Signature, code, and nonce all verified; response arrived within
    /// the challenge's validity window.
    Ok {
        trusted: TrustedFields,
        response_latency_ms: i64,
    },
    /// Signature, code, and nonce all verified, but `respondedAt` fell
    /// after `expiresAt`. Still forwarded to the Analyzer for observability.
    Expired {
        trusted: TrustedFields,
        response_latency_ms: i64,
    },
    /// Decoding, signature, code, nonce, or challenge lookup failed.
    /// `session_id`/`participant_id` are populated from the payload when it
    /// could be decoded at all (steps 2-5), even though the signature
    /// hasn't (yet, or ever) verified — carried only for audit purposes,
    /// never treated as trusted.
    Fail {
        session_id: Option<String>,
        participant_id: Option<String>,
        reason: &'static str,
    },
}

pub struct ResponseVerifier {
    mac: Arc<KeyedMac>,
    store: Arc<dyn EvidenceStore>,
}

impl ResponseVerifier {
    pub fn new(mac: Arc<KeyedMac>, store: Arc<dyn EvidenceStore>) -> Self {
        Self { mac, store }
    }

    pub async fn verify(&self, blob: &[u8], now: DateTime<Utc>) -> StructuralVerdict {
        // 1. Decode outer wrapper.
        let signed = match decode_signed_response(blob) {
            Ok(signed) => signed,
            Err(_) => {
                return StructuralVerdict::Fail {
                    session_id: None,
                    participant_id: None,
                    reason: "invalidChallenge",
                }
            }
        };

        let session_id = signed.payload.session_id.clone();
        let participant_id = signed.payload.participant_id.clone();

        // 2. Canonicalise payload and MAC-verify.
        let canonical = match canonical_bytes(&signed.payload) {
            Ok(bytes) => bytes,
            Err(_) => {
                return StructuralVerdict::Fail {
                    session_id: Some(session_id),
                    participant_id: Some(participant_id),
                    reason: "invalidChallenge",
                }
            }
        };
        if !self.mac.verify(&canonical, &signed.signature) {
            return StructuralVerdict::Fail {
                session_id: Some(session_id),
                participant_id: Some(participant_id),
                reason: "invalidChallenge",
            };
        }

        // 3. Load the outstanding challenge. Missing is fail-closed (§5).
        let key = format!("challenge:{session_id}");
        let challenge: Challenge = match get_json(self.store.as_ref(), &key).await {
            Ok(Some(challenge)) => challenge,
            Ok(None) | Err(_) => {
                return StructuralVerdict::Fail {
                    session_id: Some(session_id),
                    participant_id: Some(participant_id),
                    reason: "invalidChallenge",
                }
            }
        };

        // 4. Constant-time compare challengeCode.
        if !constant_time_bytes_eq(
            signed.payload.challenge_code.as_bytes(),
            challenge.challenge_code.as_bytes(),
        ) {
            return StructuralVerdict::Fail {
                session_id: Some(session_id),
                participant_id: Some(participant_id),
                reason: "invalidChallenge",
            };
        }

        // 5. Constant-time compare nonce.
        if !constant_time_bytes_eq(signed.payload.nonce.as_bytes(), challenge.nonce.as_bytes()) {
            return StructuralVerdict::Fail {
                session_id: Some(session_id),
                participant_id: Some(participant_id),
                reason: "invalidChallenge",
            };
        }

        // 6. Compute latency and classify ok vs expired.
        let responded_at =
            DateTime::from_timestamp_millis(signed.payload.timestamp).unwrap_or(now);
        let response_latency_ms = (responded_at - challenge.issued_at).num_milliseconds();

        let trusted = TrustedFields {
            participant_id,
            device_id: signed.payload.device_id,
            session_id,
            responded_at,
            additional_data: signed.payload.additional_data,
        };

        if responded_at > challenge.expires_at {
            StructuralVerdict::Expired {
                trusted,
                response_latency_ms,
            }
        } else {
            StructuralVerdict::Ok {
                trusted,
                response_latency_ms,
            }
        }
    }
}
