//! Attendance record and override model (§3, §4.6, §6)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::flags::AntiProxyFlags;

/// The Compositor's final verdict on one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Present,
    Flagged,
    Rejected,
}

/// A human decision that transitioned a `Flagged` record to `Present` or
/// `Rejected` (§4.6, §6 `apply_override`). A `flagged` record can only be
/// moved by an authorised override; a `present` or `rejected` one never is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideRecord {
    pub actor_id: String,
    pub reason: String,
    pub previous_outcome: Outcome,
    pub new_outcome: Outcome,
    pub overridden_at: DateTime<Utc>,
}

/// The attendance record the Compositor hands to the external durable
/// store. `id` doubles as the `attendance:{sessionId}:{participantId}`
/// compare-and-set key from §5, so overrides can address a record without
/// a separate lookup table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: String,
    pub session_id: String,
    pub participant_id: String,
    pub outcome: Outcome,
    pub risk_score: f64,
    pub flags: AntiProxyFlags,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_state: Option<OverrideRecord>,
}

impl AttendanceRecord {
    /// The `attendance:{sessionId}:{participantId}` key from §5's
    /// compare-and-set description.
    pub fn record_id(session_id: &str, participant_id: &str) -> String {
        format!("attendance:{session_id}:{participant_id}")
    }

    /// Whether this record can still accept an override (§4.6: only a
    /// `Flagged` record can transition).
    pub fn is_overridable(&self) -> bool {
        self.outcome == Outcome::Flagged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(outcome: Outcome) -> AttendanceRecord {
        AttendanceRecord {
            id: AttendanceRecord::record_id("s1", "p1"),
            session_id: "s1".into(),
            participant_id: "p1".into(),
            outcome,
            risk_score: 0.0,
            flags: AntiProxyFlags::default(),
            timestamp: Utc::now(),
            override_state: None,
        }
    }

    #[test]
    fn only_flagged_records_are_overridable() {
        assert!(sample(Outcome::Flagged).is_overridable());
        assert!(!sample(Outcome::Present).is_overridable());
        assert!(!sample(Outcome::Rejected).is_overridable());
    }

    #[test]
    fn record_id_is_stable_key_format() {
        assert_eq!(AttendanceRecord::record_id("s1", "p1"), "attendance:s1:p1");
    }
}
