//! Device-to-identity binding history (§3, §4.5(e))

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tracks every participant that has ever signed a response with a given
/// device, and when each of them was last seen on it.
///
/// A device binds to at most one *active* participant in spirit, but the
/// store keeps the full history (§3 invariant: "any second participant
/// signing with the same deviceId triggers `duplicateDevice` for the
/// second") rather than evicting the first on a second use — the
/// Analyzer, not this struct, decides what a second use means.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceUsage {
    pub device_id: String,
    pub participants: HashMap<String, DateTime<Utc>>,
}

impl DeviceUsage {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            participants: HashMap::new(),
        }
    }

    /// Whether any participant other than `participant_id` has used this
    /// device before. This is the `duplicateDevice` predicate.
    pub fn has_other_participant(&self, participant_id: &str) -> bool {
        self.participants.keys().any(|p| p != participant_id)
    }

    /// Append-to-set semantics per §5: concurrent first-uses from distinct
    /// participants both land in the map (last-seen timestamp is
    /// last-writer-wins, which is acceptable per §5).
    pub fn record_use(&mut self, participant_id: impl Into<String>, at: DateTime<Utc>) {
        self.participants.insert(participant_id.into(), at);
    }
}
