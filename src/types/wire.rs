//! SignedResponse wire format (§6)
//!
//! `base64url( utf8( json({ payload: {...}, signature }) ) )`. The field
//! names inside `payload` are fixed by the wire contract (`studentId`, not
//! `participantId`) so existing clients keep working unmodified; the rest
//! of the engine uses `participant_id` internally.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The authenticated fields a participant's client submits. Canonicalised
/// (via `crate::crypto::canonical_bytes`) and MAC-signed as-is; the
/// `#[serde(rename)]`s below are what the canonical JSON keys must be.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePayload {
    pub challenge_code: String,
    pub nonce: String,
    #[serde(rename = "studentId")]
    pub participant_id: String,
    pub device_id: String,
    pub session_id: String,
    /// Milliseconds since epoch.
    pub timestamp: i64,
    #[serde(default)]
    pub additional_data: serde_json::Map<String, serde_json::Value>,
}

/// The outer envelope: a payload plus the hex MAC signature over its
/// canonical encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedResponse {
    pub payload: ResponsePayload,
    pub signature: String,
}

/// Errors decoding the outer `base64url(utf8(json))` wrapper. These always
/// become `StructuralVerdict::Fail("invalidChallenge")` — they never
/// propagate past the Verifier.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid utf8")]
    Utf8,
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decodes a `SignedResponse` from its wire blob.
pub fn decode_signed_response(blob: &[u8]) -> Result<SignedResponse, WireError> {
    let decoded = URL_SAFE_NO_PAD
        .decode(blob)
        .map_err(|_| WireError::Base64)?;
    let text = String::from_utf8(decoded).map_err(|_| WireError::Utf8)?;
    Ok(serde_json::from_str(&text)?)
}

/// Encodes a `SignedResponse` into its wire blob. Used by the demo binary
/// and tests to construct fixtures; production clients implement this
/// independently against the wire contract.
pub fn encode_signed_response(response: &SignedResponse) -> Result<String, WireError> {
    let text = serde_json::to_string(response)?;
    Ok(URL_SAFE_NO_PAD.encode(text.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> ResponsePayload {
        ResponsePayload {
            challenge_code: "Y29kZQ".into(),
            nonce: "bm9uY2U".into(),
            participant_id: "student-1".into(),
            device_id: "device-1".into(),
            session_id: "session-1".into(),
            timestamp: 1_700_000_000_000,
            additional_data: serde_json::Map::new(),
        }
    }

    #[test]
    fn payload_serializes_with_fixed_wire_field_names() {
        let payload = sample_payload();
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"challengeCode\""));
        assert!(json.contains("\"studentId\""));
        assert!(json.contains("\"deviceId\""));
        assert!(json.contains("\"sessionId\""));
        assert!(json.contains("\"timestamp\""));
        assert!(json.contains("\"additionalData\""));
        assert!(!json.contains("\"participantId\""));
    }

    #[test]
    fn encode_then_decode_round_trips() {
        let response = SignedResponse {
            payload: sample_payload(),
            signature: "deadbeef".into(),
        };
        let blob = encode_signed_response(&response).unwrap();
        let decoded = decode_signed_response(blob.as_bytes()).unwrap();
        assert_eq!(decoded.payload.participant_id, response.payload.participant_id);
        assert_eq!(decoded.signature, response.signature);
    }

    #[test]
    fn decode_rejects_garbage_base64() {
        let err = decode_signed_response(b"not valid base64url!!!").unwrap_err();
        assert!(matches!(err, WireError::Base64));
    }

    #[test]
    fn decode_rejects_non_json_payload() {
        let blob = URL_SAFE_NO_PAD.encode(b"not json at all");
        let err = decode_signed_response(blob.as_bytes()).unwrap_err();
        assert!(matches!(err, WireError::Json(_)));
    }
}
