//! A small `Clock` abstraction so lease expiry, backoff, and idle-eviction
//! logic can be driven by a fake clock in tests instead of real wall time.

use std::sync::Mutex;

use chrono::{DateTime, Utc};

/// Anything that can report the current time. Production code uses
/// [`SystemClock`]; tests use [`FakeClock`] so expiry/backoff logic can be
/// exercised without real sleeps.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// The real clock, backed by [`chrono::Utc::now`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A manually-advanced clock for deterministic tests.
pub struct FakeClock(Mutex<DateTime<Utc>>);

impl FakeClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self(Mutex::new(start))
    }

    pub fn advance(&self, delta: chrono::Duration) {
        let mut guard = self.0.lock().expect("FakeClock mutex poisoned");
        *guard += delta;
    }

    pub fn set(&self, value: DateTime<Utc>) {
        *self.0.lock().expect("FakeClock mutex poisoned") = value;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().expect("FakeClock mutex poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_advances() {
        let start = Utc::now();
        let clock = FakeClock::new(start);
        assert_eq!(clock.now(), start);
        clock.advance(chrono::Duration::seconds(30));
        assert_eq!(clock.now(), start + chrono::Duration::seconds(30));
    }
}
