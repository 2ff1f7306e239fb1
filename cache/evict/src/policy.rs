//! Eviction policy definitions.

use crate::store::Keyspace;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Which keys may be evicted, and how victims are ranked.
///
/// `volatile-*` policies only consider keys carrying an expiration;
/// `allkeys-*` policies consider the whole keyspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvictionPolicy {
    /// Approximate LRU among keys with an expiration.
    VolatileLru,
    /// Approximate LFU among keys with an expiration.
    VolatileLfu,
    /// Uniform random among keys with an expiration.
    VolatileRandom,
    /// Soonest-to-expire among keys with an expiration.
    VolatileTtl,
    /// Approximate LRU among all keys.
    AllkeysLru,
    /// Approximate LFU among all keys.
    AllkeysLfu,
    /// Uniform random among all keys.
    AllkeysRandom,
    /// Never evict. Writes over budget are rejected.
    #[default]
    Noeviction,
}

impl EvictionPolicy {
    /// All policies, in canonical order.
    pub const ALL: [EvictionPolicy; 8] = [
        Self::VolatileLru,
        Self::VolatileLfu,
        Self::VolatileRandom,
        Self::VolatileTtl,
        Self::AllkeysLru,
        Self::AllkeysLfu,
        Self::AllkeysRandom,
        Self::Noeviction,
    ];

    /// Ranks candidates by idle time.
    #[inline]
    pub fn is_lru(&self) -> bool {
        matches!(self, Self::VolatileLru | Self::AllkeysLru)
    }

    /// Ranks candidates by decayed access frequency.
    #[inline]
    pub fn is_lfu(&self) -> bool {
        matches!(self, Self::VolatileLfu | Self::AllkeysLfu)
    }

    /// Ranks candidates by remaining time to live.
    #[inline]
    pub fn is_ttl(&self) -> bool {
        matches!(self, Self::VolatileTtl)
    }

    /// Picks victims uniformly at random, without ranking.
    #[inline]
    pub fn is_random(&self) -> bool {
        matches!(self, Self::VolatileRandom | Self::AllkeysRandom)
    }

    /// Selects victims through the candidate pool.
    #[inline]
    pub fn uses_pool(&self) -> bool {
        self.is_lru() || self.is_lfu() || self.is_ttl()
    }

    /// Only keys with an expiration are eligible.
    #[inline]
    pub fn restricts_to_volatile(&self) -> bool {
        matches!(
            self,
            Self::VolatileLru | Self::VolatileLfu | Self::VolatileRandom | Self::VolatileTtl
        )
    }

    /// Whether this policy is allowed to evict at all.
    #[inline]
    pub fn evicts(&self) -> bool {
        !matches!(self, Self::Noeviction)
    }

    /// The keyspace victims are sampled from.
    #[inline]
    pub fn keyspace(&self) -> Keyspace {
        if self.restricts_to_volatile() {
            Keyspace::Expires
        } else {
            Keyspace::Main
        }
    }

    /// Canonical configuration name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VolatileLru => "volatile-lru",
            Self::VolatileLfu => "volatile-lfu",
            Self::VolatileRandom => "volatile-random",
            Self::VolatileTtl => "volatile-ttl",
            Self::AllkeysLru => "allkeys-lru",
            Self::AllkeysLfu => "allkeys-lfu",
            Self::AllkeysRandom => "allkeys-random",
            Self::Noeviction => "noeviction",
        }
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvictionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown eviction policy: '{}'", s))
    }
}
