//! Time sources.
//!
//! The engine reads wall time through [`Clock`] so that idle-time estimation
//! and the deferred-free wait can be driven by a fake clock in tests.

use crate::lfu;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Width of the LRU clock in bits.
pub const LRU_CLOCK_BITS: u32 = 24;

/// Largest LRU clock value before wrapping.
pub const LRU_CLOCK_MAX: u32 = (1 << LRU_CLOCK_BITS) - 1;

/// Milliseconds per LRU clock tick. One tick per second, so the clock is
/// unix seconds masked to [`LRU_CLOCK_BITS`].
pub const LRU_CLOCK_RESOLUTION_MS: u64 = 1000;

/// A source of wall time that can also block the caller.
pub trait Clock: Send + Sync {
    /// Seconds since the unix epoch.
    fn unix_secs(&self) -> u64;

    /// Block the calling thread.
    fn sleep(&self, duration: Duration);
}

/// Production clock backed by the coarse clocksource.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoarseClock;

impl Clock for CoarseClock {
    #[inline]
    fn unix_secs(&self) -> u64 {
        clocksource::coarse::UnixInstant::now()
            .duration_since(clocksource::coarse::UnixInstant::EPOCH)
            .as_secs() as u64
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Manually driven clock for tests.
///
/// `sleep` does not block: it advances the clock and records the call.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
    sleeps: AtomicU64,
    slept_ms: AtomicU64,
}

impl ManualClock {
    pub fn new(unix_secs: u64) -> Self {
        Self {
            millis: AtomicU64::new(unix_secs.saturating_mul(1000)),
            sleeps: AtomicU64::new(0),
            slept_ms: AtomicU64::new(0),
        }
    }

    pub fn set(&self, unix_secs: u64) {
        self.millis
            .store(unix_secs.saturating_mul(1000), Ordering::Relaxed);
    }

    pub fn advance(&self, duration: Duration) {
        self.millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Number of times `sleep` was called.
    pub fn sleeps(&self) -> u64 {
        self.sleeps.load(Ordering::Relaxed)
    }

    /// Total duration passed to `sleep`.
    pub fn slept(&self) -> Duration {
        Duration::from_millis(self.slept_ms.load(Ordering::Relaxed))
    }
}

impl Clock for ManualClock {
    fn unix_secs(&self) -> u64 {
        self.millis.load(Ordering::Relaxed) / 1000
    }

    fn sleep(&self, duration: Duration) {
        let ms = duration.as_millis() as u64;
        self.sleeps.fetch_add(1, Ordering::Relaxed);
        self.slept_ms.fetch_add(ms, Ordering::Relaxed);
        self.millis.fetch_add(ms, Ordering::Relaxed);
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn unix_secs(&self) -> u64 {
        (**self).unix_secs()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Time snapshot shared by every estimate in one populate round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Now {
    pub unix_secs: u64,
    /// LRU clock ticks, wrapped to 24 bits.
    pub lru_clock: u32,
    /// LFU minute clock, wrapped to 16 bits.
    pub minutes: u16,
}

impl Now {
    pub fn from_secs(unix_secs: u64) -> Self {
        Self {
            unix_secs,
            lru_clock: lru_clock(unix_secs),
            minutes: lfu::minutes(unix_secs),
        }
    }

    pub fn read<C: Clock + ?Sized>(clock: &C) -> Self {
        Self::from_secs(clock.unix_secs())
    }
}

/// LRU clock value for a unix time.
#[inline]
pub fn lru_clock(unix_secs: u64) -> u32 {
    (unix_secs & LRU_CLOCK_MAX as u64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_clock_wraps() {
        assert_eq!(lru_clock(0), 0);
        assert_eq!(lru_clock(LRU_CLOCK_MAX as u64), LRU_CLOCK_MAX);
        assert_eq!(lru_clock(LRU_CLOCK_MAX as u64 + 1), 0);
        assert_eq!(lru_clock(LRU_CLOCK_MAX as u64 + 6), 5);
        assert_eq!(lru_clock(u64::MAX), LRU_CLOCK_MAX);
    }

    #[test]
    fn test_manual_clock_far_future() {
        let clock = ManualClock::new(u64::MAX);
        assert_eq!(clock.unix_secs(), u64::MAX / 1000);
        clock.set(u64::MAX / 2);
        assert_eq!(clock.unix_secs(), u64::MAX / 1000);
        assert_eq!(Now::read(&clock).lru_clock, lru_clock(u64::MAX / 1000));
    }

    #[test]
    fn test_now_snapshot() {
        let now = Now::from_secs(3600);
        assert_eq!(now.unix_secs, 3600);
        assert_eq!(now.lru_clock, 3600);
        assert_eq!(now.minutes, 60);
    }

    #[test]
    fn test_manual_clock_sleep_advances() {
        let clock = ManualClock::new(100);
        assert_eq!(clock.unix_secs(), 100);

        for _ in 0..1500 {
            clock.sleep(Duration::from_millis(1));
        }
        assert_eq!(clock.sleeps(), 1500);
        assert_eq!(clock.slept(), Duration::from_millis(1500));
        assert_eq!(clock.unix_secs(), 101);

        clock.advance(Duration::from_secs(10));
        assert_eq!(clock.unix_secs(), 111);

        clock.set(5);
        assert_eq!(clock.unix_secs(), 5);
    }

    #[test]
    fn test_coarse_clock_is_recent() {
        // 2020-01-01
        assert!(CoarseClock.unix_secs() > 1_577_836_800);
    }
}
