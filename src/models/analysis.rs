//! Per-response analysis record (§3, §4.5)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::flags::{AntiProxyFlags, ProximityFacts};

/// A non-authenticated echo of the evidence a response carried, recorded
/// alongside the flags so `session_report` and audits can see what was
/// actually submitted without re-deriving it from the raw bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceSummary {
    pub rssi: i32,
    pub proximity: ProximityFacts,
    pub response_latency_ms: i64,
    pub location_supplied: bool,
    pub wifi_network_count: usize,
    pub device_attestation_tokens: Vec<String>,
}

/// Written on every response (§4.5), keyed `analysis:{participantId}:{timestampMs}:{sequence}`.
/// TTL is `analysis_ttl_sec` (default 7 days).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub participant_id: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub flags: AntiProxyFlags,
    pub risk_score: f64,
    pub evidence_summary: EvidenceSummary,
}

impl Analysis {
    /// The analysis store key from §4.2's key scheme, `analysis:{participantId}:{timestampMs}`,
    /// disambiguated with `sequence` so two responses landing in the same
    /// millisecond (the replay scenario, among others) still get distinct
    /// records instead of the second silently overwriting the first.
    pub fn store_key(participant_id: &str, timestamp: DateTime<Utc>, sequence: u64) -> String {
        format!(
            "analysis:{participant_id}:{}:{sequence}",
            timestamp.timestamp_millis()
        )
    }

    /// The `analyses:by-session:{sessionId}` index key (§9 — written so
    /// `session_report` never has to scan the whole keyspace).
    pub fn session_index_key(session_id: &str) -> String {
        format!("analyses:by-session:{session_id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_key_embeds_millisecond_timestamp_and_sequence() {
        let ts = DateTime::from_timestamp(1_700_000_000, 123_000_000).unwrap();
        let key = Analysis::store_key("p1", ts, 0);
        assert_eq!(key, format!("analysis:p1:{}:0", ts.timestamp_millis()));
    }

    #[test]
    fn store_key_disambiguates_same_millisecond_responses() {
        let ts = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let first = Analysis::store_key("p1", ts, 0);
        let second = Analysis::store_key("p1", ts, 1);
        assert_ne!(first, second);
    }

    #[test]
    fn session_index_key_is_stable() {
        assert_eq!(Analysis::session_index_key("sess-1"), "analyses:by-session:sess-1");
    }
}
