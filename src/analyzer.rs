//! Anti-Proxy Analyzer (§4.5)
//!
//! Six sub-analyses in fixed order, each contributing flags to a shared
//! accumulator; combined into a bounded risk score. Grounded on the
//! teacher's `metadata_validation.rs`/`capture_attestation.rs` shape: small
//! independent, non-blocking sub-checks that each return a structured
//! result and are logged at `debug`, orchestrated by one entry point.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::config::PresenceConfig;
use crate::evidence_store::{get_json, put_json, EvidenceStore};
use crate::models::{
    AntiProxyFlags, Analysis, BehavioralBaseline, DeviceUsage, EvidenceSummary, ProximityFacts,
    SignalClass,
};
use crate::types::Evidence;
use crate::verifier::TrustedFields;

/// Weight table from §4.5. `invalid_challenge`'s weight is listed for
/// completeness (it drives the fixed 2.40 denominator) but the Analyzer
/// itself never sets that flag — it only ever runs once the Verifier has
/// already produced `Ok`/`Expired`, never `Fail`.
const FLAG_WEIGHTS: [(&str, f64); 9] = [
    ("weak_signal", 0.20),
    ("duplicate_device", 0.30),
    ("invalid_location", 0.25),
    ("suspicious_wifi", 0.15),
    ("late_response", 0.10),
    ("invalid_challenge", 0.40),
    ("rooted_device", 0.35),
    ("mocked_location", 0.30),
    ("unusual_pattern", 0.20),
];

/// Device usage and behavioral baseline history has no TTL in §4.2's key
/// scheme (unlike `analysis` and `location`, which are explicitly 7d/1h).
/// Not re-litigating; this default keeps the in-memory store bounded while
/// staying far longer than any individual session.
const HISTORY_TTL: Duration = Duration::from_secs(90 * 24 * 3600);

pub struct AntiProxyAnalyzer {
    store: Arc<dyn EvidenceStore>,
    config: Arc<PresenceConfig>,
    /// Disambiguates `Analysis::store_key` when two responses land in the
    /// same millisecond (e.g. a replay with no elapsed time between
    /// submissions), so the second write never silently overwrites the
    /// first.
    sequence: std::sync::atomic::AtomicU64,
}

/// The Analyzer's output: the flags and score the Compositor needs, plus
/// the evidence echo already folded into the `Analysis` the Analyzer wrote
/// to the store.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub flags: AntiProxyFlags,
    pub risk_score: f64,
}

impl AntiProxyAnalyzer {
    pub fn new(store: Arc<dyn EvidenceStore>, config: Arc<PresenceConfig>) -> Self {
        Self {
            store,
            config,
            sequence: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Runs the six sub-analyses and persists the resulting `Analysis`.
    /// `response_latency_ms` is the Verifier's trusted `respondedAt -
    /// issuedAt` delta, not evidence's own self-reported latency.
    pub async fn analyze(
        &self,
        trusted: &TrustedFields,
        response_latency_ms: i64,
        evidence: &Evidence,
        now: DateTime<Utc>,
    ) -> AnalysisOutcome {
        let mut flags = AntiProxyFlags::default();

        let proximity = self.analyze_proximity(evidence.rssi, &mut flags);
        self.analyze_timing(trusted.responded_at, now, &mut flags);
        self.analyze_location(&trusted.participant_id, evidence, now, &mut flags).await;
        self.analyze_wifi(&evidence.wifi_networks, &mut flags);
        self.analyze_device_binding(&trusted.device_id, &trusted.participant_id, evidence, now, &mut flags)
            .await;
        self.analyze_behavior(&trusted.participant_id, response_latency_ms, &mut flags)
            .await;

        let risk_score = Self::risk_score(&flags);

        let evidence_summary = EvidenceSummary {
            rssi: evidence.rssi,
            proximity,
            response_latency_ms,
            location_supplied: evidence.location.is_some(),
            wifi_network_count: evidence.wifi_networks.len(),
            device_attestation_tokens: evidence.device_attestation.iter().cloned().collect(),
        };

        let analysis = Analysis {
            participant_id: trusted.participant_id.clone(),
            session_id: trusted.session_id.clone(),
            timestamp: now,
            flags: flags.clone(),
            risk_score,
            evidence_summary,
        };

        self.persist(&analysis).await;

        AnalysisOutcome { flags, risk_score }
    }

    /// (a) Proximity / signal strength. Informational distance estimate,
    /// never used to decide `weak_signal`.
    fn analyze_proximity(&self, rssi: i32, flags: &mut AntiProxyFlags) -> ProximityFacts {
        let signal_class = if rssi <= self.config.rssi_weak_threshold {
            SignalClass::Weak
        } else if rssi <= self.config.rssi_medium_threshold {
            SignalClass::Medium
        } else {
            SignalClass::Strong
        };
        flags.weak_signal = signal_class == SignalClass::Weak;

        let estimated_distance_m = 10f64.powf((-69.0 - f64::from(rssi)) / 20.0);
        tracing::debug!(rssi, ?signal_class, estimated_distance_m, "proximity analyzed");

        ProximityFacts {
            signal_class,
            estimated_distance_m,
        }
    }

    /// (b) Response timing, measured against the Analyzer's own clock
    /// (network arrival delay), separate from the Verifier's
    /// challenge-window latency.
    fn analyze_timing(&self, responded_at: DateTime<Utc>, now: DateTime<Utc>, flags: &mut AntiProxyFlags) {
        let t_ms = (now - responded_at).num_milliseconds();
        if t_ms > self.config.response_max_reasonable_ms {
            flags.late_response = true;
        }
        if t_ms < self.config.response_suspicious_fast_ms {
            flags.unusual_pattern = true;
        }
        tracing::debug!(t_ms, "response timing analyzed");
    }

    /// (c) Location plausibility.
    async fn analyze_location(
        &self,
        participant_id: &str,
        evidence: &Evidence,
        now: DateTime<Utc>,
        flags: &mut AntiProxyFlags,
    ) {
        let Some(location) = evidence.location else {
            return;
        };

        // §9: evidence timestamped further in the future than the challenge
        // validity window is treated as entirely absent.
        let skew_bound = now + chrono::Duration::milliseconds(self.config.challenge_validity_ms);
        if location.timestamp > skew_bound {
            tracing::debug!(participant_id, "location evidence rejected for excessive future skew");
            return;
        }

        if location.lat == 0.0 && location.lon == 0.0 {
            flags.invalid_location = true;
        }
        if location.accuracy < 1.0 {
            flags.mocked_location = true;
        }

        let key = format!("location:{participant_id}:last");
        if let Ok(Some(last)) = get_json::<Evidence>(self.store.as_ref(), &key).await {
            if let Some(last_location) = last.location {
                let distance_m = haversine_distance_m(
                    last_location.lat,
                    last_location.lon,
                    location.lat,
                    location.lon,
                );
                let delta_t_ms = (location.timestamp - last_location.timestamp)
                    .num_milliseconds()
                    .max(0);
                if distance_m > self.config.location_jump_distance_m
                    && delta_t_ms < self.config.location_min_movement_time_ms
                {
                    flags.invalid_location = true;
                }
            }
        }

        // Only the location half of Evidence is meaningful to persist here;
        // wrapping it in a throwaway Evidence keeps the store's value shape
        // uniform with what analyze_location reads back above.
        let to_store = Evidence {
            location: Some(location),
            ..Evidence::default()
        };
        let ttl = Duration::from_secs(self.config.location_ttl_sec);
        let _ = put_json(self.store.as_ref(), &key, &to_store, ttl).await;
    }

    /// (d) Wireless environment.
    fn analyze_wifi(&self, networks: &[String], flags: &mut AntiProxyFlags) {
        let n = networks.len();
        if n < self.config.wifi_min_expected || n > self.config.wifi_max_reasonable {
            flags.suspicious_wifi = true;
        }
        for ssid in networks {
            let upper = ssid.to_uppercase();
            if self
                .config
                .wifi_blacklist
                .iter()
                .any(|entry| upper.contains(entry.as_str()))
            {
                flags.suspicious_wifi = true;
                break;
            }
        }
    }

    /// (e) Device binding / attestation.
    async fn analyze_device_binding(
        &self,
        device_id: &str,
        participant_id: &str,
        evidence: &Evidence,
        now: DateTime<Utc>,
        flags: &mut AntiProxyFlags,
    ) {
        let key = format!("device:{device_id}:usage");
        let mut usage = get_json::<DeviceUsage>(self.store.as_ref(), &key)
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| DeviceUsage::new(device_id));

        if usage.has_other_participant(participant_id) {
            flags.duplicate_device = true;
        }

        if evidence
            .device_attestation
            .iter()
            .any(|token| self.config.attestation_blacklist.contains(token))
        {
            flags.rooted_device = true;
        }

        usage.record_use(participant_id, now);
        let _ = put_json(self.store.as_ref(), &key, &usage, HISTORY_TTL).await;
    }

    /// (f) Behavioral deviation.
    async fn analyze_behavior(&self, participant_id: &str, response_latency_ms: i64, flags: &mut AntiProxyFlags) {
        let key = format!("behavior:{participant_id}:pattern");
        let current_latency = response_latency_ms.max(0) as f64;

        let baseline = get_json::<BehavioralBaseline>(self.store.as_ref(), &key)
            .await
            .ok()
            .flatten();

        let updated = match baseline {
            Some(existing) => {
                if existing.deviates(current_latency) {
                    flags.unusual_pattern = true;
                }
                existing.update(current_latency, self.config.behavioral_alpha)
            }
            None => BehavioralBaseline::first_observation(current_latency),
        };

        let _ = put_json(self.store.as_ref(), &key, &updated, HISTORY_TTL).await;
    }

    async fn persist(&self, analysis: &Analysis) {
        let sequence = self.sequence.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let key = Analysis::store_key(&analysis.participant_id, analysis.timestamp, sequence);
        let ttl = Duration::from_secs(self.config.analysis_ttl_sec);
        if put_json(self.store.as_ref(), &key, analysis, ttl).await.is_err() {
            tracing::warn!(
                participant_id = %analysis.participant_id,
                session_id = %analysis.session_id,
                "failed to persist analysis"
            );
            return;
        }

        let index_key = Analysis::session_index_key(&analysis.session_id);
        let _ = self.store.append_set_member(&index_key, &key, ttl).await;
    }

    /// `riskScore = min(100, 100 * Σ(tripped weights) / Σ(all weights))`.
    /// The denominator is the fixed sum of all nine weights (§9), not the
    /// subset applicable to this response.
    fn risk_score(flags: &AntiProxyFlags) -> f64 {
        let total_weight: f64 = FLAG_WEIGHTS.iter().map(|(_, w)| w).sum();
        let tripped_weight: f64 = flags
            .iter()
            .map(|(name, tripped)| {
                if tripped {
                    FLAG_WEIGHTS
                        .iter()
                        .find(|(n, _)| *n == name)
                        .map(|(_, w)| *w)
                        .unwrap_or(0.0)
                } else {
                    0.0
                }
            })
            .sum();
        (100.0 * tripped_weight / total_weight).min(100.0)
    }
}

/// Great-circle distance in metres (haversine, Earth radius 6,371,000 m).
fn haversine_distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );
    let d_lat = lat2 - lat1;
    let d_lon = lon2 - lon1;
    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_M * c
}
