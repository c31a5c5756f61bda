//! Clock abstraction so the shield and prediction timing can run on
//! virtual time in tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    fn sleep(&self, duration: Duration);
}

pub struct RealClock;

impl RealClock {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RealClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for RealClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Virtual clock: a fixed epoch plus an atomically advanced offset.
/// `sleep` advances the offset instead of blocking, so time-driven
/// state machines can be stepped deterministically.
pub struct TestClock {
    epoch: Instant,
    offset_micros: AtomicU64,
}

impl TestClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            offset_micros: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.offset_micros
            .fetch_add(duration.as_micros() as u64, Ordering::SeqCst);
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn now(&self) -> Instant {
        self.epoch + Duration::from_micros(self.offset_micros.load(Ordering::SeqCst))
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

pub type SharedClock = Arc<dyn Clock + Send + Sync>;

pub fn real_clock() -> SharedClock {
    Arc::new(RealClock::new())
}

pub fn test_clock() -> Arc<TestClock> {
    Arc::new(TestClock::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances_without_blocking() {
        let clock = TestClock::new();
        let t0 = clock.now();
        clock.advance(Duration::from_millis(450));
        assert_eq!(clock.now() - t0, Duration::from_millis(450));
    }

    #[test]
    fn test_clock_sleep_is_virtual() {
        let clock = TestClock::new();
        let t0 = clock.now();
        clock.sleep(Duration::from_secs(30));
        assert_eq!(clock.now() - t0, Duration::from_secs(30));
    }

    #[test]
    fn real_clock_is_monotonic() {
        let clock = RealClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
