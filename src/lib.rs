//! Presence verification engine.
//!
//! A library-shaped service that issues time-bounded cryptographic
//! challenges, verifies signed responses against replay and tampering, runs
//! an anti-proxy analysis over the accompanying evidence bundle, and
//! composes an auditable attendance outcome. See `PresenceEngine` for the
//! four operations callers use.

pub mod analyzer;
pub mod clock;
pub mod compositor;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod evidence_store;
pub mod issuer;
pub mod models;
pub mod types;
pub mod verifier;

pub use config::PresenceConfig;
pub use engine::{AllowAllAuthorizer, OverrideAuthorizer, PresenceEngine};
pub use error::EngineError;
