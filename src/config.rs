//! Engine configuration
//!
//! Loads configuration from environment variables with sensible defaults.
//! Every tunable named in the spec lives here; nothing is read from the
//! environment anywhere else in the crate.

use dotenvy::dotenv;
use std::env;

use crate::error::EngineError;

/// Wifi SSID substrings that mark an access point as emulator/test tooling rather
/// than a genuine nearby network.
pub const DEFAULT_WIFI_BLACKLIST: &[&str] = &[
    "MOCK_WIFI",
    "TEST_AP",
    "FAKE_NETWORK",
    "EMULATOR_WIFI",
    "SIMULATOR_AP",
    "DEBUG_WIFI",
    "PROXY_NETWORK",
];

/// Device attestation tokens that mark a device as compromised/emulated.
pub const DEFAULT_ATTESTATION_BLACKLIST: &[&str] = &["rooted", "jailbroken", "emulator"];

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct PresenceConfig {
    /// Shared HMAC secret. Never logged, never exposed in error messages.
    pub secret: Vec<u8>,

    /// Challenge validity window in milliseconds (default: 15000).
    pub challenge_validity_ms: i64,
    /// Challenge code length in bytes (default: 32).
    pub challenge_code_bytes: usize,
    /// Nonce length in bytes (default: 16).
    pub nonce_bytes: usize,

    /// RSSI at or below this value (dBm) is classified `weak` (default: -70).
    pub rssi_weak_threshold: i32,
    /// RSSI at or below this value (dBm), and above the weak threshold, is `medium` (default: -50).
    pub rssi_medium_threshold: i32,

    /// Response latency below this is suspiciously fast (default: 200ms).
    pub response_suspicious_fast_ms: i64,
    /// Response latency below this (and at/above suspicious_fast) is merely unusual, no flag (default: 500ms).
    pub response_min_human_ms: i64,
    /// Response latency above this is late (default: 10000ms).
    pub response_max_reasonable_ms: i64,

    /// Location jump distance in metres that is implausible within `location_min_movement_time_ms` (default: 1000).
    pub location_jump_distance_m: f64,
    /// Minimum time in milliseconds required to plausibly cover `location_jump_distance_m` (default: 30000).
    pub location_min_movement_time_ms: i64,

    /// Minimum expected nearby wifi networks (default: 1).
    pub wifi_min_expected: usize,
    /// Maximum reasonable nearby wifi networks (default: 20).
    pub wifi_max_reasonable: usize,
    /// SSID substrings (matched case-insensitively) that mark an access point as suspicious.
    pub wifi_blacklist: Vec<String>,

    /// Device attestation tokens that mark a device as compromised/emulated.
    pub attestation_blacklist: Vec<String>,

    /// Smoothing factor for the behavioral baseline EWMA (default: 0.2).
    pub behavioral_alpha: f64,
    /// TTL for stored Analysis records in seconds (default: 604800 = 7 days).
    pub analysis_ttl_sec: u64,
    /// TTL for the last-known-location record in seconds (default: 3600 = 1h).
    pub location_ttl_sec: u64,

    /// Log format: "json" for structured, "pretty" for human-readable (default: pretty).
    pub log_format: String,

    /// Redis connection URL, only consulted when the `redis-store` feature is enabled
    /// and the embedding binary opts into `RedisEvidenceStore`.
    pub redis_url: String,
}

impl PresenceConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to sensible defaults for every tunable except the secret, which
    /// has no permissive fallback: a missing or malformed secret is a fatal
    /// `ConfigurationError`.
    pub fn load() -> Result<Self, EngineError> {
        dotenv().ok();

        let secret = load_secret()?;

        let wifi_blacklist = env::var("WIFI_BLACKLIST")
            .map(|s| {
                s.split(',')
                    .map(|x| x.trim().to_uppercase())
                    .filter(|x| !x.is_empty())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_else(|_| {
                DEFAULT_WIFI_BLACKLIST
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            });

        let attestation_blacklist = env::var("ATTESTATION_BLACKLIST")
            .map(|s| {
                s.split(',')
                    .map(|x| x.trim().to_lowercase())
                    .filter(|x| !x.is_empty())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_else(|_| {
                DEFAULT_ATTESTATION_BLACKLIST
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            });

        Ok(Self {
            secret,
            challenge_validity_ms: parse_env("CHALLENGE_VALIDITY_MS", 15_000)?,
            challenge_code_bytes: parse_env("CHALLENGE_CODE_BYTES", 32usize)?,
            nonce_bytes: parse_env("NONCE_BYTES", 16usize)?,
            rssi_weak_threshold: parse_env("RSSI_WEAK_THRESHOLD", -70)?,
            rssi_medium_threshold: parse_env("RSSI_MEDIUM_THRESHOLD", -50)?,
            response_suspicious_fast_ms: parse_env("RESPONSE_SUSPICIOUS_FAST_MS", 200)?,
            response_min_human_ms: parse_env("RESPONSE_MIN_HUMAN_MS", 500)?,
            response_max_reasonable_ms: parse_env("RESPONSE_MAX_REASONABLE_MS", 10_000)?,
            location_jump_distance_m: parse_env("LOCATION_JUMP_DISTANCE_M", 1000.0)?,
            location_min_movement_time_ms: parse_env("LOCATION_MIN_MOVEMENT_TIME_MS", 30_000)?,
            wifi_min_expected: parse_env("WIFI_MIN_EXPECTED", 1usize)?,
            wifi_max_reasonable: parse_env("WIFI_MAX_REASONABLE", 20usize)?,
            wifi_blacklist,
            attestation_blacklist,
            behavioral_alpha: parse_env("BEHAVIORAL_ALPHA", 0.2)?,
            analysis_ttl_sec: parse_env("ANALYSIS_TTL_SEC", 604_800u64)?,
            location_ttl_sec: parse_env("LOCATION_TTL_SEC", 3_600u64)?,
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
        })
    }

    /// Creates a default configuration for testing purposes, with a fixed
    /// non-empty secret so tests never depend on the environment. Not
    /// `cfg(test)`-gated: integration tests under `tests/` link against this
    /// crate compiled without `cfg(test)` and need it too.
    pub fn default_for_test() -> Self {
        Self {
            secret: b"test-secret-do-not-use-in-production".to_vec(),
            challenge_validity_ms: 15_000,
            challenge_code_bytes: 32,
            nonce_bytes: 16,
            rssi_weak_threshold: -70,
            rssi_medium_threshold: -50,
            response_suspicious_fast_ms: 200,
            response_min_human_ms: 500,
            response_max_reasonable_ms: 10_000,
            location_jump_distance_m: 1000.0,
            location_min_movement_time_ms: 30_000,
            wifi_min_expected: 1,
            wifi_max_reasonable: 20,
            wifi_blacklist: DEFAULT_WIFI_BLACKLIST.iter().map(|s| s.to_string()).collect(),
            attestation_blacklist: DEFAULT_ATTESTATION_BLACKLIST
                .iter()
                .map(|s| s.to_string())
                .collect(),
            behavioral_alpha: 0.2,
            analysis_ttl_sec: 604_800,
            location_ttl_sec: 3_600,
            log_format: "pretty".to_string(),
            redis_url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

/// Loads the shared secret from `PRESENCE_ENGINE_SECRET`. Accepts hex or base64url;
/// falls back to raw UTF-8 bytes if neither decodes. A missing or empty secret is fatal.
fn load_secret() -> Result<Vec<u8>, EngineError> {
    let raw = env::var("PRESENCE_ENGINE_SECRET").map_err(|_| {
        EngineError::ConfigurationError("PRESENCE_ENGINE_SECRET is not set".to_string())
    })?;

    if raw.trim().is_empty() {
        return Err(EngineError::ConfigurationError(
            "PRESENCE_ENGINE_SECRET is empty".to_string(),
        ));
    }

    if let Ok(bytes) = hex::decode(&raw) {
        if !bytes.is_empty() {
            return Ok(bytes);
        }
    }

    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
    if let Ok(bytes) = URL_SAFE_NO_PAD.decode(&raw) {
        if !bytes.is_empty() {
            return Ok(bytes);
        }
    }

    Ok(raw.into_bytes())
}

/// Parses an environment variable via `FromStr`, falling back to `default` when unset
/// and raising a `ConfigurationError` when set but unparseable.
fn parse_env<T>(key: &str, default: T) -> Result<T, EngineError>
where
    T: std::str::FromStr,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| EngineError::ConfigurationError(format!("{key} is not a valid value"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_for_test_has_expected_defaults() {
        let cfg = PresenceConfig::default_for_test();
        assert_eq!(cfg.challenge_validity_ms, 15_000);
        assert_eq!(cfg.rssi_weak_threshold, -70);
        assert_eq!(cfg.wifi_blacklist.len(), DEFAULT_WIFI_BLACKLIST.len());
        assert!(!cfg.secret.is_empty());
    }

    #[test]
    fn load_secret_rejects_missing_env() {
        // SAFETY-equivalent: env access is not unsafe, just racy under parallel tests;
        // this test only reads a variable that is never set elsewhere in this crate's suite.
        env::remove_var("PRESENCE_ENGINE_SECRET_TEST_PROBE");
        let result = env::var("PRESENCE_ENGINE_SECRET_TEST_PROBE");
        assert!(result.is_err());
    }
}
