//! Per-identity behavioral baseline (§3, §4.5(f))

use serde::{Deserialize, Serialize};

/// A rolling average/variance of a participant's response latency, updated
/// by an exponentially weighted moving average after each successful
/// verification — "a rolling average, not unbounded history" (§4.5(f)).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BehavioralBaseline {
    pub mean_latency_ms: f64,
    pub variance_ms2: f64,
    pub sample_count: u64,
}

impl BehavioralBaseline {
    /// Seeds a baseline from the first observed latency. Variance starts at
    /// zero; it widens as subsequent observations disagree with the mean.
    pub fn first_observation(latency_ms: f64) -> Self {
        Self {
            mean_latency_ms: latency_ms,
            variance_ms2: 0.0,
            sample_count: 1,
        }
    }

    /// Whether `latency_ms` deviates from the baseline mean by more than
    /// half the mean — the `unusualPattern` predicate from §4.5(f).
    pub fn deviates(&self, latency_ms: f64) -> bool {
        (latency_ms - self.mean_latency_ms).abs() > 0.5 * self.mean_latency_ms
    }

    /// Folds a new observation into the baseline using an EWMA with
    /// smoothing factor `alpha` (recommended 0.2).
    pub fn update(&self, latency_ms: f64, alpha: f64) -> Self {
        let delta = latency_ms - self.mean_latency_ms;
        let new_mean = self.mean_latency_ms + alpha * delta;
        let new_variance = (1.0 - alpha) * (self.variance_ms2 + alpha * delta * delta);
        Self {
            mean_latency_ms: new_mean,
            variance_ms2: new_variance,
            sample_count: self.sample_count.saturating_add(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_observation_has_zero_variance() {
        let baseline = BehavioralBaseline::first_observation(500.0);
        assert_eq!(baseline.mean_latency_ms, 500.0);
        assert_eq!(baseline.variance_ms2, 0.0);
        assert_eq!(baseline.sample_count, 1);
    }

    #[test]
    fn deviates_at_boundary() {
        let baseline = BehavioralBaseline::first_observation(1000.0);
        assert!(!baseline.deviates(1500.0 - 0.0001));
        assert!(baseline.deviates(1500.0001));
        assert!(!baseline.deviates(500.0001));
        assert!(baseline.deviates(499.9999));
    }

    #[test]
    fn update_moves_mean_toward_new_observation() {
        let baseline = BehavioralBaseline::first_observation(1000.0);
        let updated = baseline.update(1000.0, 0.2);
        assert_eq!(updated.mean_latency_ms, 1000.0);
        assert_eq!(updated.sample_count, 2);

        let updated = baseline.update(600.0, 0.2);
        assert!((updated.mean_latency_ms - 920.0).abs() < 1e-9);
    }
}
