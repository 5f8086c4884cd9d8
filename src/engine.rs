//! `PresenceEngine` (§6): the library-shaped facade callers embed.
//!
//! Owns the process-scoped singletons (secret, config, EvidenceStore handle)
//! and wires the five components into the four public operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::analyzer::AntiProxyAnalyzer;
use crate::clock::{Clock, SystemClock};
use crate::compositor::VerdictCompositor;
use crate::config::PresenceConfig;
use crate::crypto::KeyedMac;
use crate::error::EngineError;
use crate::evidence_store::{get_json, EvidenceStore};
use crate::issuer::ChallengeIssuer;
use crate::models::{AttendanceRecord, Challenge, Outcome};
use crate::types::{Evidence, RiskDistribution, SessionReport};
use crate::verifier::ResponseVerifier;

/// Gates `apply_override` (§6). Supplied by the embedding application —
/// this crate makes no claim about who is allowed to override a flagged
/// record, only that the decision is checked before anything mutates.
#[async_trait]
pub trait OverrideAuthorizer: Send + Sync {
    async fn authorize(&self, actor_id: &str, record: &AttendanceRecord) -> bool;
}

/// An authorizer that accepts every request. Useful for tests and for
/// embedders that perform authorization entirely upstream of this crate.
#[derive(Debug, Default)]
pub struct AllowAllAuthorizer;

#[async_trait]
impl OverrideAuthorizer for AllowAllAuthorizer {
    async fn authorize(&self, _actor_id: &str, _record: &AttendanceRecord) -> bool {
        true
    }
}

/// The engine's four public operations over one `EvidenceStore` and one
/// `KeyedMac`, both process-scoped singletons (§5's resource policy).
pub struct PresenceEngine {
    config: Arc<PresenceConfig>,
    store: Arc<dyn EvidenceStore>,
    clock: Arc<dyn Clock>,
    issuer: ChallengeIssuer,
    verifier: ResponseVerifier,
    analyzer: AntiProxyAnalyzer,
    compositor: VerdictCompositor,
    authorizer: Arc<dyn OverrideAuthorizer>,
}

impl PresenceEngine {
    /// Builds an engine over `store`, using the real wall clock.
    pub fn new(
        config: PresenceConfig,
        store: Arc<dyn EvidenceStore>,
        authorizer: Arc<dyn OverrideAuthorizer>,
    ) -> Self {
        Self::with_clock(config, store, authorizer, Arc::new(SystemClock))
    }

    /// Builds an engine over an explicit `Clock`, for deterministic tests.
    pub fn with_clock(
        config: PresenceConfig,
        store: Arc<dyn EvidenceStore>,
        authorizer: Arc<dyn OverrideAuthorizer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let config = Arc::new(config);
        let mac = Arc::new(KeyedMac::new(&config.secret));
        let issuer = ChallengeIssuer::new(store.clone(), clock.clone(), &config);
        let verifier = ResponseVerifier::new(mac, store.clone());
        let analyzer = AntiProxyAnalyzer::new(store.clone(), config.clone());
        let compositor = VerdictCompositor::new(store.clone());

        Self {
            config,
            store,
            clock,
            issuer,
            verifier,
            analyzer,
            compositor,
            authorizer,
        }
    }

    pub async fn issue_challenge(
        &self,
        session_id: &str,
        organiser_id: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<Challenge, EngineError> {
        self.issuer.issue(session_id, organiser_id, metadata).await
    }

    /// Runs the full Verifier → Analyzer → Compositor pipeline for one
    /// signed response and its accompanying evidence bundle.
    pub async fn verify_response(
        &self,
        signed_response_blob: &[u8],
        evidence: &Evidence,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRecord, EngineError> {
        let verdict = self.verifier.verify(signed_response_blob, now).await;

        let (risk_score, flags) = match &verdict {
            crate::verifier::StructuralVerdict::Fail { .. } => (None, None),
            crate::verifier::StructuralVerdict::Ok {
                trusted,
                response_latency_ms,
            }
            | crate::verifier::StructuralVerdict::Expired {
                trusted,
                response_latency_ms,
            } => {
                let outcome = self
                    .analyzer
                    .analyze(trusted, *response_latency_ms, evidence, now)
                    .await;
                (Some(outcome.risk_score), Some(outcome.flags))
            }
        };

        Ok(self.compositor.compose(&verdict, risk_score, flags, now).await)
    }

    /// Aggregates every `Analysis` recorded for `session_id` via the
    /// `analyses:by-session:{sessionId}` index (§9).
    pub async fn session_report(&self, session_id: &str) -> Result<SessionReport, EngineError> {
        let index_key = crate::models::Analysis::session_index_key(session_id);
        let keys = self
            .store
            .set_members(&index_key)
            .await
            .map_err(|e| EngineError::EvidenceStoreUnavailable(e.0))?;

        let mut report = SessionReport::default();
        for key in &keys {
            let Ok(Some(analysis)) = get_json::<crate::models::Analysis>(self.store.as_ref(), key).await else {
                continue;
            };

            report.total_responses += 1;
            if analysis.flags.any_tripped() {
                report.flagged_responses += 1;
            }
            bucket_risk(&mut report.risk_distribution, analysis.risk_score);
            for (name, tripped) in analysis.flags.iter() {
                if tripped {
                    *report.flag_type_counts.entry(name.to_string()).or_insert(0) += 1;
                }
            }
        }

        report.recommendations = recommendations(&report);
        Ok(report)
    }

    /// Transitions a `Flagged` record to `new_outcome`, gated by the
    /// configured `OverrideAuthorizer`. Only ever reads and rewrites the
    /// single record at `record_id`; never touches the CAS semantics the
    /// Compositor uses for first-submission races.
    pub async fn apply_override(
        &self,
        record_id: &str,
        actor_id: &str,
        reason: &str,
        new_outcome: Outcome,
    ) -> Result<AttendanceRecord, EngineError> {
        let mut record = get_json::<AttendanceRecord>(self.store.as_ref(), record_id)
            .await
            .map_err(|e| EngineError::EvidenceStoreUnavailable(e.0))?
            .ok_or_else(|| EngineError::RecordNotFound(record_id.to_string()))?;

        if !record.is_overridable() {
            return Err(EngineError::OverrideUnauthorised);
        }

        if !self.authorizer.authorize(actor_id, &record).await {
            return Err(EngineError::OverrideUnauthorised);
        }

        let previous_outcome = record.outcome;
        record.override_state = Some(crate::models::OverrideRecord {
            actor_id: actor_id.to_string(),
            reason: reason.to_string(),
            previous_outcome,
            new_outcome,
            overridden_at: self.clock.now(),
        });
        record.outcome = new_outcome;

        let ttl = std::time::Duration::from_secs(self.config.analysis_ttl_sec);
        crate::evidence_store::put_json(self.store.as_ref(), record_id, &record, ttl)
            .await
            .map_err(|e| EngineError::EvidenceStoreUnavailable(e.0))?;

        Ok(record)
    }
}

/// §4.5's risk-score bands: `< 30` low, `< 70` medium, else high.
fn bucket_risk(distribution: &mut RiskDistribution, risk_score: f64) {
    if risk_score < 30.0 {
        distribution.low += 1;
    } else if risk_score < 70.0 {
        distribution.medium += 1;
    } else {
        distribution.high += 1;
    }
}

/// The three recommendation rules from §6.
fn recommendations(report: &SessionReport) -> Vec<String> {
    let mut out = Vec::new();

    if report.total_responses > 0 {
        let flagged_ratio = report.flagged_responses as f64 / report.total_responses as f64;
        if flagged_ratio > 0.10 {
            out.push("review attendance policies".to_string());
        }
    }

    if report.flag_type_counts.get("duplicate_device").copied().unwrap_or(0) > 0 {
        out.push("enforce device binding".to_string());
    }

    if report.flag_type_counts.get("weak_signal").copied().unwrap_or(0) > 5 {
        out.push("check short-range radio range".to_string());
    }

    out
}
