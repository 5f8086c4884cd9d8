//! End-to-end scenarios against the full `PresenceEngine` public surface,
//! exercising the Issuer → Verifier → Analyzer → Compositor pipeline over
//! `MemoryEvidenceStore` with a `FixedClock` (§8's six concrete scenarios).

use chrono::{Duration, Utc};
use presence_verify::clock::FixedClock;
use presence_verify::config::PresenceConfig;
use presence_verify::crypto::{canonical_bytes, KeyedMac};
use presence_verify::engine::AllowAllAuthorizer;
use presence_verify::evidence_store::MemoryEvidenceStore;
use presence_verify::models::{Challenge, Outcome};
use presence_verify::types::{encode_signed_response, Evidence, Location, ResponsePayload, SignedResponse};
use presence_verify::PresenceEngine;
use std::collections::HashSet;
use std::sync::Arc;

fn engine_with_clock() -> (PresenceEngine, Arc<FixedClock>, PresenceConfig) {
    let config = PresenceConfig::default_for_test();
    let clock = Arc::new(FixedClock::new(Utc::now()));
    let store = Arc::new(MemoryEvidenceStore::with_clock(clock.clone()));
    let engine = PresenceEngine::with_clock(
        config.clone(),
        store,
        Arc::new(AllowAllAuthorizer),
        clock.clone(),
    );
    (engine, clock, config)
}

fn sign(config: &PresenceConfig, challenge: &Challenge, participant_id: &str, device_id: &str, timestamp: i64) -> Vec<u8> {
    let mac = KeyedMac::new(&config.secret);
    let payload = ResponsePayload {
        challenge_code: challenge.challenge_code.clone(),
        nonce: challenge.nonce.clone(),
        participant_id: participant_id.to_string(),
        device_id: device_id.to_string(),
        session_id: challenge.session_id.clone(),
        timestamp,
        additional_data: serde_json::Map::new(),
    };
    let canonical = canonical_bytes(&payload).unwrap();
    let signature = mac.sign(&canonical);
    encode_signed_response(&SignedResponse { payload, signature })
        .unwrap()
        .into_bytes()
}

fn benign_evidence() -> Evidence {
    Evidence {
        rssi: -45,
        response_latency_ms: None,
        location: Some(Location {
            lat: 40.0,
            lon: -73.0,
            accuracy: 8.0,
            timestamp: Utc::now(),
        }),
        wifi_networks: vec![
            "Home-WiFi".into(),
            "Neighbor-5G".into(),
            "CoffeeShop".into(),
            "Guest-Net".into(),
            "Office-AP".into(),
            "Lobby-WiFi".into(),
        ],
        device_attestation: HashSet::new(),
        organiser_session_meta: None,
    }
}

/// Scenario 1: happy path.
#[tokio::test]
async fn happy_path_is_present_with_zero_risk_and_no_flags() {
    let (engine, clock, config) = engine_with_clock();
    let challenge = engine.issue_challenge("sess-1", "org-1", None).await.unwrap();
    clock.advance(Duration::milliseconds(4200));

    let blob = sign(&config, &challenge, "p1", "d1", clock.now().timestamp_millis());
    clock.advance(Duration::milliseconds(600));
    let record = engine
        .verify_response(&blob, &benign_evidence(), clock.now())
        .await
        .unwrap();

    assert_eq!(record.outcome, Outcome::Present);
    assert_eq!(record.risk_score, 0.0);
    assert!(!record.flags.any_tripped());
}

/// Scenario 2: replay. Same blob submitted twice; first wins, second is an
/// unchanged duplicate, but its analysis was still recorded.
#[tokio::test]
async fn replay_of_same_signed_response_is_rejected_as_duplicate_commit() {
    let (engine, clock, config) = engine_with_clock();
    let challenge = engine.issue_challenge("sess-2", "org-1", None).await.unwrap();
    clock.advance(Duration::milliseconds(4200));

    let blob = sign(&config, &challenge, "p1", "d1", clock.now().timestamp_millis());
    clock.advance(Duration::milliseconds(600));
    let first = engine
        .verify_response(&blob, &benign_evidence(), clock.now())
        .await
        .unwrap();
    let second = engine
        .verify_response(&blob, &benign_evidence(), clock.now())
        .await
        .unwrap();

    assert_eq!(first.outcome, Outcome::Present);
    assert_eq!(second.id, first.id);
    assert_eq!(second.timestamp, first.timestamp);

    let report = engine.session_report("sess-2").await.unwrap();
    assert_eq!(report.total_responses, 2);
}

/// Scenario 3: weak signal plus an implausible location jump.
#[tokio::test]
async fn weak_signal_and_location_jump_are_flagged() {
    let (engine, clock, config) = engine_with_clock();

    let challenge1 = engine.issue_challenge("sess-3", "org-1", None).await.unwrap();
    let first_blob = sign(&config, &challenge1, "p1", "d1", clock.now().timestamp_millis());
    let mut first_evidence = benign_evidence();
    first_evidence.location = Some(Location {
        lat: 40.0,
        lon: -73.0,
        accuracy: 8.0,
        timestamp: clock.now(),
    });
    engine
        .verify_response(&first_blob, &first_evidence, clock.now())
        .await
        .unwrap();

    clock.advance(Duration::seconds(10));
    let challenge2 = engine.issue_challenge("sess-3", "org-1", None).await.unwrap();
    let second_blob = sign(&config, &challenge2, "p1", "d1", clock.now().timestamp_millis());
    let mut second_evidence = benign_evidence();
    second_evidence.rssi = -82;
    second_evidence.location = Some(Location {
        lat: 40.0135,
        lon: -73.0,
        accuracy: 8.0,
        timestamp: clock.now(),
    });

    let record = engine
        .verify_response(&second_blob, &second_evidence, clock.now())
        .await
        .unwrap();

    assert!(record.flags.weak_signal);
    assert!(record.flags.invalid_location);
    assert_eq!(record.outcome, Outcome::Flagged);
}

/// Scenario 4: expired structural verdict.
#[tokio::test]
async fn expired_response_is_flagged_with_late_response() {
    let (engine, clock, config) = engine_with_clock();
    let challenge = engine.issue_challenge("sess-4", "org-1", None).await.unwrap();
    clock.advance(Duration::milliseconds(16_000));

    let blob = sign(&config, &challenge, "p1", "d1", clock.now().timestamp_millis());
    let record = engine
        .verify_response(&blob, &benign_evidence(), clock.now())
        .await
        .unwrap();

    assert_eq!(record.outcome, Outcome::Flagged);
    assert!(record.flags.late_response);
}

/// Scenario 5: a second participant on a previously used device.
#[tokio::test]
async fn second_participant_on_same_device_trips_duplicate_device() {
    let (engine, clock, config) = engine_with_clock();

    let challenge1 = engine.issue_challenge("sess-5", "org-1", None).await.unwrap();
    let blob1 = sign(&config, &challenge1, "p1", "shared-device", clock.now().timestamp_millis());
    engine.verify_response(&blob1, &benign_evidence(), clock.now()).await.unwrap();

    let challenge2 = engine.issue_challenge("sess-5", "org-1", None).await.unwrap();
    let blob2 = sign(&config, &challenge2, "p2", "shared-device", clock.now().timestamp_millis());
    let record = engine
        .verify_response(&blob2, &benign_evidence(), clock.now())
        .await
        .unwrap();

    assert!(record.flags.duplicate_device);
}

/// Scenario 6: mocked location plus rooted device attestation.
#[tokio::test]
async fn mocked_location_and_rooted_device_produce_bounded_flagged_score() {
    let (engine, clock, config) = engine_with_clock();
    let challenge = engine.issue_challenge("sess-6", "org-1", None).await.unwrap();

    let blob = sign(&config, &challenge, "p1", "d1", clock.now().timestamp_millis());
    let mut evidence = benign_evidence();
    evidence.location = Some(Location {
        lat: 40.0,
        lon: -73.0,
        accuracy: 0.5,
        timestamp: clock.now(),
    });
    evidence.device_attestation = HashSet::from(["rooted".to_string()]);

    let record = engine
        .verify_response(&blob, &evidence, clock.now())
        .await
        .unwrap();

    assert!(record.flags.mocked_location);
    assert!(record.flags.rooted_device);
    assert_eq!(record.outcome, Outcome::Flagged);
    assert!(record.risk_score <= 100.0);
}

/// A tampered signature is rejected outright, before any evidence is
/// considered, regardless of how benign the evidence bundle looks.
#[tokio::test]
async fn tampered_signature_is_rejected_with_full_risk_score() {
    let (engine, clock, config) = engine_with_clock();
    let challenge = engine.issue_challenge("sess-7", "org-1", None).await.unwrap();

    let payload = ResponsePayload {
        challenge_code: challenge.challenge_code.clone(),
        nonce: challenge.nonce.clone(),
        participant_id: "p1".to_string(),
        device_id: "d1".to_string(),
        session_id: challenge.session_id.clone(),
        timestamp: clock.now().timestamp_millis(),
        additional_data: serde_json::Map::new(),
    };
    let mac = KeyedMac::new(&config.secret);
    let canonical = canonical_bytes(&payload).unwrap();
    let mut signature = mac.sign(&canonical);
    signature.replace_range(0..1, if &signature[0..1] == "0" { "1" } else { "0" });

    let blob = encode_signed_response(&SignedResponse { payload, signature })
        .unwrap()
        .into_bytes();

    let record = engine
        .verify_response(&blob, &benign_evidence(), clock.now())
        .await
        .unwrap();

    assert_eq!(record.outcome, Outcome::Rejected);
    assert_eq!(record.risk_score, 100.0);
}

/// `apply_override` end to end: a flagged record can be promoted to
/// present by an authorised actor, and the transition is recorded.
#[tokio::test]
async fn override_promotes_flagged_record_to_present() {
    let (engine, clock, config) = engine_with_clock();
    let challenge = engine.issue_challenge("sess-8", "org-1", None).await.unwrap();
    clock.advance(Duration::milliseconds(16_000));

    let blob = sign(&config, &challenge, "p1", "d1", clock.now().timestamp_millis());
    let record = engine
        .verify_response(&blob, &benign_evidence(), clock.now())
        .await
        .unwrap();
    assert_eq!(record.outcome, Outcome::Flagged);

    let overridden = engine
        .apply_override(&record.id, "organiser-1", "confirmed present in person", Outcome::Present)
        .await
        .unwrap();

    assert_eq!(overridden.outcome, Outcome::Present);
    let override_state = overridden.override_state.unwrap();
    assert_eq!(override_state.actor_id, "organiser-1");
    assert_eq!(override_state.previous_outcome, Outcome::Flagged);
}
