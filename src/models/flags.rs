//! Anti-proxy flags and the signal-strength facts that feed them (§3, §4.5)

use serde::{Deserialize, Serialize};

/// Coarse classification of received radio signal strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalClass {
    Weak,
    Medium,
    Strong,
}

/// Derived, non-authenticated facts about the radio link. Computed fresh on
/// every analysis; never persisted on its own (it rides along inside
/// `Analysis::evidence_summary`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProximityFacts {
    pub signal_class: SignalClass,
    /// Log-distance path-loss estimate in metres. Informational only, never
    /// used to decide `weak_signal`.
    pub estimated_distance_m: f64,
}

/// The closed set of anti-proxy sub-analysis outcomes (§9: a tagged variant
/// replaces the source's freeform option bag). `details` carries diagnostic
/// context only — nothing in the engine branches on it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AntiProxyFlags {
    pub weak_signal: bool,
    pub duplicate_device: bool,
    pub invalid_location: bool,
    pub suspicious_wifi: bool,
    pub late_response: bool,
    pub invalid_challenge: bool,
    pub rooted_device: bool,
    pub mocked_location: bool,
    pub unusual_pattern: bool,
    #[serde(default)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl AntiProxyFlags {
    /// True if any boolean flag is set. Used by the Compositor to decide
    /// between `Present` and `Flagged` once the structural verdict is `Ok`.
    pub fn any_tripped(&self) -> bool {
        self.weak_signal
            || self.duplicate_device
            || self.invalid_location
            || self.suspicious_wifi
            || self.late_response
            || self.invalid_challenge
            || self.rooted_device
            || self.mocked_location
            || self.unusual_pattern
    }

    /// Iterates the nine named flags as `(name, tripped)` pairs, in the fixed
    /// order the risk-score weight table uses. Used by both the risk scorer
    /// and `session_report`'s `flag_type_counts`.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, bool)> {
        [
            ("weak_signal", self.weak_signal),
            ("duplicate_device", self.duplicate_device),
            ("invalid_location", self.invalid_location),
            ("suspicious_wifi", self.suspicious_wifi),
            ("late_response", self.late_response),
            ("invalid_challenge", self.invalid_challenge),
            ("rooted_device", self.rooted_device),
            ("mocked_location", self.mocked_location),
            ("unusual_pattern", self.unusual_pattern),
        ]
        .into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_tripped_false_by_default() {
        assert!(!AntiProxyFlags::default().any_tripped());
    }

    #[test]
    fn any_tripped_true_when_one_flag_set() {
        let mut flags = AntiProxyFlags::default();
        flags.weak_signal = true;
        assert!(flags.any_tripped());
    }

    #[test]
    fn iter_yields_nine_flags_in_weight_table_order() {
        let flags = AntiProxyFlags::default();
        let names: Vec<&str> = flags.iter().map(|(name, _)| name).collect();
        assert_eq!(
            names,
            vec![
                "weak_signal",
                "duplicate_device",
                "invalid_location",
                "suspicious_wifi",
                "late_response",
                "invalid_challenge",
                "rooted_device",
                "mocked_location",
                "unusual_pattern",
            ]
        );
    }
}
