//! Challenge Issuer (§4.3)

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::config::PresenceConfig;
use crate::error::EngineError;
use crate::evidence_store::{get_json, put_json, EvidenceStore};
use crate::models::Challenge;

/// Mints time-bounded challenges and persists them to the `EvidenceStore`
/// under `challenge:{sessionId}` (§4.2's key scheme).
pub struct ChallengeIssuer {
    store: Arc<dyn EvidenceStore>,
    clock: Arc<dyn Clock>,
    validity: chrono::Duration,
    code_bytes: usize,
    nonce_bytes: usize,
}

impl ChallengeIssuer {
    pub fn new(store: Arc<dyn EvidenceStore>, clock: Arc<dyn Clock>, config: &PresenceConfig) -> Self {
        Self {
            store,
            clock,
            validity: chrono::Duration::milliseconds(config.challenge_validity_ms),
            code_bytes: config.challenge_code_bytes,
            nonce_bytes: config.nonce_bytes,
        }
    }

    /// Issues a challenge for `session_id`. Reissuing for a session that
    /// already has an outstanding challenge overwrites it, and is logged.
    pub async fn issue(
        &self,
        session_id: &str,
        organiser_id: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<Challenge, EngineError> {
        let key = format!("challenge:{session_id}");

        if let Ok(Some(_existing)) = get_json::<Challenge>(self.store.as_ref(), &key).await {
            tracing::info!(session_id, "reissuing challenge, overwriting prior challenge");
        }

        let issued_at = self.clock.now();
        let expires_at = issued_at + self.validity;

        let challenge = Challenge {
            session_id: session_id.to_string(),
            challenge_code: random_urlsafe_b64(self.code_bytes),
            nonce: random_urlsafe_b64(self.nonce_bytes),
            issued_at,
            expires_at,
            organiser_id: organiser_id.to_string(),
            metadata,
        };

        let ttl = self.validity.to_std().unwrap_or(Duration::from_millis(15_000));
        put_json(self.store.as_ref(), &key, &challenge, ttl)
            .await
            .map_err(|e| EngineError::EvidenceStoreUnavailable(e.0))?;

        Ok(challenge)
    }
}

fn random_urlsafe_b64(n_bytes: usize) -> String {
    let mut bytes = vec![0u8; n_bytes.max(1)];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
