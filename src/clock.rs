// =============================================================================
// Clock — wall-clock source, overridable in tests
// =============================================================================
//
// Every timestamp the engine produces (`measured_at`, `as_of`, `submitted_at`,
// ...) goes through a `Clock` rather than calling `chrono::Utc::now()`
// directly, so that seed-scenario tests can pin time and assert exact
// freshness/decay values instead of racing the wall clock.
// =============================================================================

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// Wall-clock source consumed by the engine.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The production clock: delegates straight to `Utc::now()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to a fixed instant, with the ability to advance it
/// explicitly. Used by tests that need deterministic freshness/decay math.
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(at),
        }
    }

    /// Move the clock forward by `duration`.
    pub fn advance(&self, duration: chrono::Duration) {
        let mut now = self.now.write();
        *now += duration;
    }

    /// Set the clock to an absolute instant.
    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.write() = at;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances_deterministically() {
        let start = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let clock = FixedClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(chrono::Duration::days(14));
        assert_eq!(clock.now(), start + chrono::Duration::days(14));
    }
}
