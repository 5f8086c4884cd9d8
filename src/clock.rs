//! Time source abstraction
//!
//! The Verifier and Analyzer take `now` as an explicit parameter from their
//! caller (so property tests can probe expiry boundaries exactly). The Issuer
//! and the EvidenceStore's own TTL bookkeeping go through this `Clock` trait
//! instead of calling `Utc::now()` inline, so the same determinism extends to
//! challenge issuance and cache expiry in tests.

use chrono::{DateTime, Utc};

/// A source of the current time.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock, used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A fixed clock for deterministic tests (unit tests in this crate and
/// integration tests under `tests/`). `advance` lets a test move time forward
/// without constructing a new clock.
#[derive(Debug)]
pub struct FixedClock(std::sync::Mutex<DateTime<Utc>>);

impl FixedClock {
    pub fn new(t: DateTime<Utc>) -> Self {
        Self(std::sync::Mutex::new(t))
    }

    pub fn advance(&self, delta: chrono::Duration) {
        let mut guard = self.0.lock().expect("clock mutex poisoned");
        *guard += delta;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().expect("clock mutex poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn fixed_clock_advances() {
        let t0 = Utc::now();
        let clock = FixedClock::new(t0);
        assert_eq!(clock.now(), t0);
        clock.advance(Duration::seconds(5));
        assert_eq!(clock.now(), t0 + Duration::seconds(5));
    }
}
