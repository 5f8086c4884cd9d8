//! Session report (§6 `session_report`)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Counts of responses by risk-score band (`< 30` low, `< 70` medium, else
/// high — §4.5's classification bands).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RiskDistribution {
    pub low: u64,
    pub medium: u64,
    pub high: u64,
}

/// Aggregated view of every analysis recorded for a session, built from the
/// `analyses:by-session:{sessionId}` index (§9) rather than a full
/// keyspace scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionReport {
    pub total_responses: u64,
    pub flagged_responses: u64,
    pub risk_distribution: RiskDistribution,
    pub flag_type_counts: HashMap<String, u64>,
    pub recommendations: Vec<String>,
}
