//! Engine error handling
//!
//! Defines the single fatal error type the engine can raise at init, and the
//! reasons a per-response call can be denied outright (never as a panic,
//! always as a `Result`).

use thiserror::Error;

/// Errors the engine can surface. Per-response cryptographic/temporal outcomes
/// (`invalidChallenge`, `expiredChallenge`) are *not* represented as errors once
/// a response reaches the Compositor — they become `Outcome::Rejected` /
/// `Outcome::Flagged` records. `EngineError` covers the handful of cases where
/// there is genuinely nothing sensible to return: an error happens on an
/// operation that is not "verify one response" (construction, override
/// authorization), or the operation cannot even start (bad encoding before a
/// structural verdict can be formed, store wholly unavailable for a required read).
#[derive(Debug, Error)]
pub enum EngineError {
    /// Raised only at init: a bad secret or an unparseable threshold. Fatal.
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// The signed response could not even be decoded into a payload
    /// (malformed base64/JSON) or its session has no outstanding challenge.
    /// Distinct from a structural MAC/code/nonce mismatch, which still
    /// produces an `AttendanceRecord` so the rejection is auditable.
    #[error("invalid challenge: {0}")]
    InvalidChallenge(String),

    /// The EvidenceStore could not service a *required* read (the challenge
    /// lookup). Non-critical lookups (history, baseline, device usage) never
    /// raise this — they degrade to "no prior data" instead.
    #[error("evidence store unavailable: {0}")]
    EvidenceStoreUnavailable(String),

    /// `apply_override` was called without authorization. The only error
    /// `apply_override` can return.
    #[error("override not authorised")]
    OverrideUnauthorised,

    /// The record an override was requested against does not exist.
    #[error("attendance record not found: {0}")]
    RecordNotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_never_echo_secret_material() {
        let err = EngineError::ConfigurationError("bad threshold".to_string());
        assert!(!err.to_string().contains("secret"));
    }
}
