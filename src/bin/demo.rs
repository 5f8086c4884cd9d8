//! Manual exercise harness for `PresenceEngine`.
//!
//! The engine is library-shaped (§6: no REST/WebSocket surface of its own),
//! so there is no server to run here. This binary wires config + tracing +
//! an in-memory store the way `main.rs` wires a server elsewhere in this
//! lineage, then mints a challenge, signs and verifies a response against
//! it, and prints the resulting attendance record and session report.

use presence_verify::clock::SystemClock;
use presence_verify::config::PresenceConfig;
use presence_verify::crypto::{canonical_bytes, KeyedMac};
use presence_verify::engine::AllowAllAuthorizer;
use presence_verify::evidence_store::MemoryEvidenceStore;
use presence_verify::types::{encode_signed_response, Evidence, Location, ResponsePayload, SignedResponse};
use presence_verify::PresenceEngine;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

#[tokio::main]
async fn main() {
    let config = PresenceConfig::load().unwrap_or_else(|_| PresenceConfig::default_for_test());
    init_tracing(&config.log_format);

    tracing::info!("starting presence engine demo");

    let store = Arc::new(MemoryEvidenceStore::new());
    let _cleanup_handle = MemoryEvidenceStore::spawn_cleanup_task(store.clone());

    let engine = PresenceEngine::with_clock(
        config_for_demo(&config),
        store.clone(),
        Arc::new(AllowAllAuthorizer),
        Arc::new(SystemClock),
    );

    let session_id = format!("session-{}", Uuid::new_v4());
    let participant_id = format!("participant-{}", Uuid::new_v4());
    let device_id = format!("device-{}", Uuid::new_v4());

    let challenge = engine
        .issue_challenge(&session_id, "organiser-demo", None)
        .await
        .expect("issue challenge");
    tracing::info!(session_id = %challenge.session_id, "challenge issued");

    let secret = config_for_demo(&config).secret;
    let mac = KeyedMac::new(&secret);
    let payload = ResponsePayload {
        challenge_code: challenge.challenge_code.clone(),
        nonce: challenge.nonce.clone(),
        participant_id: participant_id.clone(),
        device_id,
        session_id: session_id.clone(),
        timestamp: chrono::Utc::now().timestamp_millis(),
        additional_data: serde_json::Map::new(),
    };
    let canonical = canonical_bytes(&payload).expect("canonicalize payload");
    let signature = mac.sign(&canonical);
    let blob = encode_signed_response(&SignedResponse { payload, signature })
        .expect("encode signed response")
        .into_bytes();

    let evidence = Evidence {
        rssi: -48,
        response_latency_ms: None,
        location: Some(Location {
            lat: 40.7128,
            lon: -74.0060,
            accuracy: 12.0,
            timestamp: chrono::Utc::now(),
        }),
        wifi_networks: vec![
            "Office-WiFi".into(),
            "Office-5G".into(),
            "Guest-Net".into(),
        ],
        device_attestation: Default::default(),
        organiser_session_meta: None,
    };

    let record = engine
        .verify_response(&blob, &evidence, chrono::Utc::now())
        .await
        .expect("verify response");
    tracing::info!(?record, "attendance record composed");

    let report = engine.session_report(&session_id).await.expect("session report");
    tracing::info!(?report, "session report");

    println!("{}", serde_json::to_string_pretty(&record).unwrap());
    println!("{}", serde_json::to_string_pretty(&report).unwrap());
}

/// Replaces a freshly loaded config's secret with a fixed demo value when
/// running without `PRESENCE_ENGINE_SECRET` set, so `cargo run --bin demo`
/// works out of the box. Never used outside this binary.
fn config_for_demo(config: &PresenceConfig) -> PresenceConfig {
    let mut config = config.clone();
    if config.secret.is_empty() {
        config.secret = b"demo-secret-do-not-use-in-production".to_vec();
    }
    config
}

fn init_tracing(log_format: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer())
                .init();
        }
    }
}
