//! Verdict Compositor (§4.6)
//!
//! Merges a `StructuralVerdict` with the Analyzer's flags into one
//! `AttendanceRecord`, and owns the compare-and-set discipline over
//! `attendance:{sessionId}:{participantId}` that makes "first commit wins"
//! true under concurrent submissions (§5).

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::evidence_store::{compare_and_set_json, get_json, put_json, EvidenceStore};
use crate::models::{AntiProxyFlags, AttendanceRecord, Outcome};
use crate::verifier::StructuralVerdict;

/// TTL for attendance records. Not in §4.2's key table (only `analysis` and
/// `location` are); matched to `analysis_ttl_sec` so a session's attendance
/// and analysis evidence expire together.
const ATTENDANCE_TTL_SEC: u64 = 7 * 24 * 3600;

pub struct VerdictCompositor {
    store: Arc<dyn EvidenceStore>,
}

impl VerdictCompositor {
    pub fn new(store: Arc<dyn EvidenceStore>) -> Self {
        Self { store }
    }

    /// Composes and persists the `AttendanceRecord` for one response.
    ///
    /// `analysis` is `None` exactly when `verdict` is `Fail` (the Analyzer
    /// never runs on a structural failure).
    pub async fn compose(
        &self,
        verdict: &StructuralVerdict,
        risk_score: Option<f64>,
        flags: Option<AntiProxyFlags>,
        now: DateTime<Utc>,
    ) -> AttendanceRecord {
        match verdict {
            StructuralVerdict::Fail {
                session_id,
                participant_id,
                ..
            } => {
                let record = AttendanceRecord {
                    id: AttendanceRecord::record_id(
                        session_id.as_deref().unwrap_or("unknown"),
                        participant_id.as_deref().unwrap_or("unknown"),
                    ),
                    session_id: session_id.clone().unwrap_or_default(),
                    participant_id: participant_id.clone().unwrap_or_default(),
                    outcome: Outcome::Rejected,
                    risk_score: 100.0,
                    flags: AntiProxyFlags {
                        invalid_challenge: true,
                        ..AntiProxyFlags::default()
                    },
                    timestamp: now,
                    override_state: None,
                };
                // No reliable identity and no CAS key to protect: a failed
                // response never competes with a genuine submission for the
                // same (sessionId, participantId) slot.
                record
            }
            StructuralVerdict::Expired { trusted, .. } => {
                let mut flags = flags.unwrap_or_default();
                flags.late_response = true;
                let record = AttendanceRecord {
                    id: AttendanceRecord::record_id(&trusted.session_id, &trusted.participant_id),
                    session_id: trusted.session_id.clone(),
                    participant_id: trusted.participant_id.clone(),
                    outcome: Outcome::Flagged,
                    risk_score: risk_score.unwrap_or(100.0),
                    flags,
                    timestamp: now,
                    override_state: None,
                };
                self.commit(record).await
            }
            StructuralVerdict::Ok { trusted, .. } => {
                let flags = flags.unwrap_or_default();
                let outcome = if flags.any_tripped() {
                    Outcome::Flagged
                } else {
                    Outcome::Present
                };
                let record = AttendanceRecord {
                    id: AttendanceRecord::record_id(&trusted.session_id, &trusted.participant_id),
                    session_id: trusted.session_id.clone(),
                    participant_id: trusted.participant_id.clone(),
                    outcome,
                    risk_score: risk_score.unwrap_or(0.0),
                    flags,
                    timestamp: now,
                    override_state: None,
                };
                self.commit(record).await
            }
        }
    }

    /// Attempts compare-and-set against the record's CAS key. The analysis
    /// was already recorded by the Analyzer before this runs, so a lost
    /// race never loses evidence — only the attendance record itself.
    async fn commit(&self, record: AttendanceRecord) -> AttendanceRecord {
        let ttl = Duration::from_secs(ATTENDANCE_TTL_SEC);
        match compare_and_set_json(self.store.as_ref(), &record.id, &record, ttl).await {
            Ok(true) => record,
            Ok(false) => self.resolve_duplicate(record, ttl).await,
            Err(_) => {
                tracing::warn!(record_id = %record.id, "evidence store unavailable composing attendance record");
                record
            }
        }
    }

    /// A CAS loss means a record already occupies this slot. A `Flagged`
    /// occupant may still be upserted by a later re-submission (§4.6); a
    /// `Present` occupant is final — the loser is returned as an unchanged
    /// duplicate (its own analysis was already stored by the Analyzer).
    async fn resolve_duplicate(&self, record: AttendanceRecord, ttl: Duration) -> AttendanceRecord {
        match get_json::<AttendanceRecord>(self.store.as_ref(), &record.id).await {
            Ok(Some(existing)) if existing.outcome == Outcome::Present => existing,
            _ => {
                let _ = put_json(self.store.as_ref(), &record.id, &record, ttl).await;
                record
            }
        }
    }
}
