//! Priority estimation.
//!
//! Every policy maps a sampled entry to a `u64` where larger means "evict
//! sooner". Values are only comparable within one policy.

use crate::clock::{LRU_CLOCK_MAX, LRU_CLOCK_RESOLUTION_MS, Now};
use crate::lfu::{self, LFU_COUNTER_MAX};
use crate::meta::AccessMeta;
use crate::policy::EvictionPolicy;
use crate::store::Sampled;

/// Milliseconds since the last access, treating the LRU clock as cyclic.
#[inline]
pub fn idle_time_ms(lru: u32, now: u32) -> u64 {
    let ticks = if now >= lru {
        (now - lru) as u64
    } else {
        now as u64 + (LRU_CLOCK_MAX - lru) as u64
    };
    ticks * LRU_CLOCK_RESOLUTION_MS
}

/// Inverse of the decayed access frequency.
#[inline]
pub fn lfu_priority(meta: AccessMeta, now_minutes: u16, decay_time: u32) -> u64 {
    let counter = lfu::decay(meta.ldt(), meta.counter(), now_minutes, decay_time);
    (LFU_COUNTER_MAX - counter) as u64
}

/// Inverse of the remaining time to live. Already expired keys rank highest.
#[inline]
pub fn ttl_priority(expire_at_secs: u64, now_secs: u64) -> u64 {
    u64::MAX - expire_at_secs.saturating_sub(now_secs)
}

/// Per-policy priority function.
#[derive(Debug, Clone, Copy)]
pub struct Estimator {
    policy: EvictionPolicy,
    lfu_decay_time: u32,
}

impl Estimator {
    pub fn new(policy: EvictionPolicy, lfu_decay_time: u32) -> Self {
        Self {
            policy,
            lfu_decay_time,
        }
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    /// Priority of a sampled entry, or `None` if the policy does not rank
    /// entries or the sample carries the wrong kind of value.
    pub fn estimate(&self, sampled: Sampled, now: &Now) -> Option<u64> {
        match sampled {
            Sampled::Value(meta) if self.policy.is_lru() => {
                Some(idle_time_ms(meta.lru_clock(), now.lru_clock))
            }
            Sampled::Value(meta) if self.policy.is_lfu() => {
                Some(lfu_priority(meta, now.minutes, self.lfu_decay_time))
            }
            Sampled::Expire(at) if self.policy.is_ttl() => Some(ttl_priority(at, now.unix_secs)),
            _ => None,
        }
    }
}
