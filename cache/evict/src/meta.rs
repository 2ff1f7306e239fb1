//! Per-value access metadata.

use crate::clock::{LRU_CLOCK_MAX, Now};
use crate::config::EvictionConfig;
use crate::lfu::{self, LFU_INIT_VAL};
use crate::policy::EvictionPolicy;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

/// 24 bits of access metadata stored alongside every value.
///
/// Under LRU policies it holds the LRU clock of the last access. Under LFU
/// policies it packs the last decrement minute in the high 16 bits and the
/// logarithmic counter in the low 8 bits:
///
/// ```text
///   23            8 7        0
///  +---------------+----------+
///  |  ldt (16 bit) | counter  |
///  +---------------+----------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AccessMeta(u32);

impl AccessMeta {
    #[inline]
    pub fn from_lru_clock(clock: u32) -> Self {
        Self(clock & LRU_CLOCK_MAX)
    }

    #[inline]
    pub fn from_lfu(ldt: u16, counter: u8) -> Self {
        Self(((ldt as u32) << 8) | counter as u32)
    }

    /// Reinterpret raw stored bits. Bits above 24 are discarded.
    #[inline]
    pub fn from_raw(raw: u32) -> Self {
        Self(raw & LRU_CLOCK_MAX)
    }

    #[inline]
    pub fn raw(&self) -> u32 {
        self.0
    }

    #[inline]
    pub fn lru_clock(&self) -> u32 {
        self.0
    }

    /// Last decrement time, in minutes.
    #[inline]
    pub fn ldt(&self) -> u16 {
        (self.0 >> 8) as u16
    }

    #[inline]
    pub fn counter(&self) -> u8 {
        (self.0 & 0xFF) as u8
    }
}

/// Maintains [`AccessMeta`] on behalf of the store.
///
/// The store calls [`on_create`](Self::on_create) when a value is created and
/// [`on_access`](Self::on_access) on every read or write. This is the only
/// place where LFU decay is written back.
#[derive(Debug)]
pub struct AccessTracker<R> {
    policy: EvictionPolicy,
    log_factor: u32,
    decay_time: u32,
    rng: R,
}

impl AccessTracker<Xoshiro256PlusPlus> {
    /// Tracker for the configured policy, seeded from `config.seed` if set.
    pub fn from_config(config: &EvictionConfig) -> Self {
        let seed = config.seed.unwrap_or_else(|| rand::rng().random());
        Self::new(
            config.policy,
            config.lfu_log_factor,
            config.lfu_decay_time,
            Xoshiro256PlusPlus::seed_from_u64(seed),
        )
    }
}

impl<R: Rng> AccessTracker<R> {
    pub fn new(policy: EvictionPolicy, log_factor: u32, decay_time: u32, rng: R) -> Self {
        Self {
            policy,
            log_factor,
            decay_time,
            rng,
        }
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    /// Switch policy. Existing metadata is reinterpreted, not converted.
    pub fn set_policy(&mut self, policy: EvictionPolicy, log_factor: u32, decay_time: u32) {
        self.policy = policy;
        self.log_factor = log_factor;
        self.decay_time = decay_time;
    }

    pub fn on_create(&self, now: &Now) -> AccessMeta {
        if self.policy.is_lfu() {
            AccessMeta::from_lfu(now.minutes, LFU_INIT_VAL)
        } else {
            AccessMeta::from_lru_clock(now.lru_clock)
        }
    }

    pub fn on_access(&mut self, meta: AccessMeta, now: &Now) -> AccessMeta {
        if self.policy.is_lfu() {
            let counter = lfu::decay(meta.ldt(), meta.counter(), now.minutes, self.decay_time);
            let counter = lfu::log_incr(counter, self.log_factor, &mut self.rng);
            AccessMeta::from_lfu(now.minutes, counter)
        } else {
            AccessMeta::from_lru_clock(now.lru_clock)
        }
    }
}
