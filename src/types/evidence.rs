//! Evidence bundle (§3): everything a client submits alongside the signed
//! response that is not itself cryptographically authenticated.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Coarse location reading. `timestamp` is client-supplied and, per §9,
/// clamped against clock skew before use.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
    /// Reported accuracy radius in metres.
    pub accuracy: f64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// The non-authenticated evidence bundle submitted alongside a
/// `SignedResponse`. The Verifier never inspects this; only the Analyzer
/// does (§4.4).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Evidence {
    /// Received signal strength in dBm (negative).
    pub rssi: i32,
    /// Client-reported round-trip latency. Informational only — the
    /// Analyzer's timing sub-analysis and the behavioral baseline both use
    /// the trusted `respondedAt`/`issuedAt` values from the authenticated
    /// payload and challenge instead, per §4.4/§4.5(b).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_latency_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default)]
    pub wifi_networks: Vec<String>,
    #[serde(default)]
    pub device_attestation: HashSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organiser_session_meta: Option<serde_json::Value>,
}
