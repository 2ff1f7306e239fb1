//! Sharded keyspace.

use crate::error::{KeyspaceError, KeyspaceResult};
use crate::lazyfree::LazyFree;
use crate::memory::{EXPIRE_OVERHEAD, MemoryCounter, entry_size};
use crate::table::Table;
use evict::{
    AccessMeta, AccessTracker, Clock, CoarseClock, EvictionConfig, Keyspace, Now, Sampled, Store,
};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::cell::RefCell;
use std::time::Duration;

/// Values shorter than this are freed inline even when a background deleter
/// is running.
pub const DEFAULT_LAZYFREE_THRESHOLD: usize = 64;

#[derive(Debug)]
struct Entry {
    value: Box<[u8]>,
    meta: AccessMeta,
}

#[derive(Debug, Default)]
struct Shard {
    main: Table<Entry>,
    /// Absolute expiration in unix seconds.
    expires: Table<u64>,
}

/// Read and expiry counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyspaceStats {
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
}

/// In-memory keyspace split into independent shards.
///
/// Each shard has a main table and an expires table holding only the keys
/// that carry a time to live. Every entry charges its size to a shared
/// [`MemoryCounter`], which [`TrackedHost`](crate::TrackedHost) reports as
/// allocator usage.
#[derive(Debug)]
pub struct KeyspaceStore<C = CoarseClock> {
    shards: Vec<Shard>,
    memory: MemoryCounter,
    tracker: AccessTracker<Xoshiro256PlusPlus>,
    rng: RefCell<Xoshiro256PlusPlus>,
    lazyfree: Option<LazyFree>,
    lazyfree_threshold: usize,
    clock: C,
    stats: KeyspaceStats,
}

/// Builder for [`KeyspaceStore`].
#[derive(Debug)]
pub struct KeyspaceBuilder<C = CoarseClock> {
    shards: usize,
    config: EvictionConfig,
    lazyfree: Option<bool>,
    lazyfree_delay: Option<Duration>,
    lazyfree_threshold: usize,
    clock: C,
}

impl Default for KeyspaceBuilder<CoarseClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyspaceBuilder<CoarseClock> {
    pub fn new() -> Self {
        Self {
            shards: 1,
            config: EvictionConfig::default(),
            lazyfree: None,
            lazyfree_delay: None,
            lazyfree_threshold: DEFAULT_LAZYFREE_THRESHOLD,
            clock: CoarseClock,
        }
    }
}

impl<C: Clock> KeyspaceBuilder<C> {
    /// Number of shards. Default 1.
    pub fn shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    /// Policy, LFU parameters and seed used to maintain access metadata.
    /// Enables the background deleter if the config asks for lazy eviction.
    pub fn eviction(mut self, config: &EvictionConfig) -> Self {
        self.config = config.clone();
        self
    }

    /// Force the background deleter on or off.
    pub fn lazyfree(mut self, enabled: bool) -> Self {
        self.lazyfree = Some(enabled);
        self
    }

    /// Slow the background deleter down by `delay` per value.
    pub fn lazyfree_delay(mut self, delay: Duration) -> Self {
        self.lazyfree_delay = Some(delay);
        self
    }

    /// Smallest value length handed to the background deleter.
    pub fn lazyfree_threshold(mut self, bytes: usize) -> Self {
        self.lazyfree_threshold = bytes;
        self
    }

    pub fn clock<C2: Clock>(self, clock: C2) -> KeyspaceBuilder<C2> {
        KeyspaceBuilder {
            shards: self.shards,
            config: self.config,
            lazyfree: self.lazyfree,
            lazyfree_delay: self.lazyfree_delay,
            lazyfree_threshold: self.lazyfree_threshold,
            clock,
        }
    }

    pub fn build(self) -> KeyspaceResult<KeyspaceStore<C>> {
        if self.shards == 0 {
            return Err(KeyspaceError::InvalidConfig(
                "shards must be at least 1".into(),
            ));
        }

        let memory = MemoryCounter::new();
        let lazyfree = if self.lazyfree.unwrap_or(self.config.lazyfree_lazy_eviction) {
            Some(LazyFree::spawn(memory.clone(), self.lazyfree_delay)?)
        } else {
            None
        };

        let seed = self.config.seed.unwrap_or_else(|| rand::rng().random());

        Ok(KeyspaceStore {
            shards: (0..self.shards).map(|_| Shard::default()).collect(),
            memory,
            tracker: AccessTracker::from_config(&self.config),
            rng: RefCell::new(Xoshiro256PlusPlus::seed_from_u64(seed.wrapping_add(1))),
            lazyfree,
            lazyfree_threshold: self.lazyfree_threshold,
            clock: self.clock,
            stats: KeyspaceStats::default(),
        })
    }
}

impl KeyspaceStore<CoarseClock> {
    pub fn builder() -> KeyspaceBuilder<CoarseClock> {
        KeyspaceBuilder::new()
    }
}

impl<C: Clock> KeyspaceStore<C> {
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Bytes charged by live entries and values awaiting background free.
    pub fn memory(&self) -> u64 {
        self.memory.get()
    }

    /// Handle to the shared byte counter.
    pub fn memory_counter(&self) -> MemoryCounter {
        self.memory.clone()
    }

    pub fn stats(&self) -> KeyspaceStats {
        self.stats
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Keys in a shard's main table.
    pub fn shard_len(&self, shard: usize) -> usize {
        self.shards.get(shard).map_or(0, |s| s.main.len())
    }

    /// Keys across all shards.
    pub fn total_len(&self) -> usize {
        self.shards.iter().map(|s| s.main.len()).sum()
    }

    /// Keys with an expiration across all shards.
    pub fn total_volatile(&self) -> usize {
        self.shards.iter().map(|s| s.expires.len()).sum()
    }

    /// Switch how access metadata is maintained. Existing metadata is not
    /// converted.
    pub fn set_eviction(&mut self, config: &EvictionConfig) {
        self.tracker
            .set_policy(config.policy, config.lfu_log_factor, config.lfu_decay_time);
    }

    /// Store a value, replacing any previous one. A `ttl` makes the key
    /// volatile; without one any previous expiration is cleared.
    pub fn set(
        &mut self,
        shard: usize,
        key: &[u8],
        value: &[u8],
        ttl: Option<Duration>,
    ) -> KeyspaceResult<()> {
        let now = Now::read(&self.clock);
        let shards = self.shards.len();
        let s = self
            .shards
            .get_mut(shard)
            .ok_or(KeyspaceError::ShardOutOfRange { shard, shards })?;

        let was_volatile = match ttl {
            Some(ttl) => s.expires.insert(key, expire_at(&now, ttl)).is_some(),
            None => s.expires.remove(key).is_some(),
        };

        let entry = Entry {
            value: value.into(),
            meta: self.tracker.on_create(&now),
        };
        if let Some(old) = s.main.insert(key, entry) {
            self.memory.sub(entry_size(key, &old.value, was_volatile));
        }
        self.memory.add(entry_size(key, value, ttl.is_some()));
        Ok(())
    }

    /// Look up a value, updating its access metadata. Expired keys are
    /// deleted and reported as missing.
    pub fn get(&mut self, shard: usize, key: &[u8]) -> Option<&[u8]> {
        let now = Now::read(&self.clock);

        if self.is_expired(shard, key, &now) {
            self.remove(shard, key, false);
            self.stats.expired += 1;
            self.stats.misses += 1;
            return None;
        }

        let Some(entry) = self
            .shards
            .get_mut(shard)
            .and_then(|s| s.main.get_mut(key))
        else {
            self.stats.misses += 1;
            return None;
        };

        entry.meta = self.tracker.on_access(entry.meta, &now);
        self.stats.hits += 1;
        Some(&entry.value)
    }

    /// Whether the key exists, without touching its metadata.
    pub fn contains_key(&self, shard: usize, key: &[u8]) -> bool {
        self.shards
            .get(shard)
            .is_some_and(|s| s.main.contains(key))
    }

    pub fn delete(&mut self, shard: usize, key: &[u8]) -> bool {
        self.remove(shard, key, false)
    }

    /// Set a time to live on an existing key.
    pub fn expire(&mut self, shard: usize, key: &[u8], ttl: Duration) -> bool {
        let now = Now::read(&self.clock);
        let Some(s) = self.shards.get_mut(shard) else {
            return false;
        };
        if !s.main.contains(key) {
            return false;
        }
        if s.expires.insert(key, expire_at(&now, ttl)).is_none() {
            self.memory.add(EXPIRE_OVERHEAD);
        }
        true
    }

    /// Remove a key's time to live.
    pub fn persist(&mut self, shard: usize, key: &[u8]) -> bool {
        let removed = self
            .shards
            .get_mut(shard)
            .and_then(|s| s.expires.remove(key))
            .is_some();
        if removed {
            self.memory.sub(EXPIRE_OVERHEAD);
        }
        removed
    }

    /// Remaining time to live in seconds, if the key is volatile.
    pub fn ttl(&self, shard: usize, key: &[u8]) -> Option<u64> {
        let at = *self.shards.get(shard)?.expires.get(key)?;
        Some(at.saturating_sub(self.clock.unix_secs()))
    }

    /// Access metadata of a key, without touching it.
    pub fn meta(&self, shard: usize, key: &[u8]) -> Option<AccessMeta> {
        self.shards.get(shard)?.main.get(key).map(|e| e.meta)
    }

    /// Values queued for background free.
    pub fn pending_frees(&self) -> usize {
        self.lazyfree.as_ref().map_or(0, |l| l.pending())
    }

    /// Block until the background deleter is idle.
    pub fn wait_lazyfree(&self) {
        if let Some(lazyfree) = &self.lazyfree {
            lazyfree.wait_idle();
        }
    }

    fn is_expired(&self, shard: usize, key: &[u8], now: &Now) -> bool {
        self.shards
            .get(shard)
            .and_then(|s| s.expires.get(key))
            .is_some_and(|at| now.unix_secs >= *at)
    }

    /// Unlink a key and release its bytes, in the background if `deferred`
    /// and a deleter is running.
    fn remove(&mut self, shard: usize, key: &[u8], deferred: bool) -> bool {
        let Some(s) = self.shards.get_mut(shard) else {
            return false;
        };
        let Some(entry) = s.main.remove(key) else {
            return false;
        };
        let volatile = s.expires.remove(key).is_some();
        let bytes = entry_size(key, &entry.value, volatile);

        match &self.lazyfree {
            Some(lazyfree) if deferred && entry.value.len() >= self.lazyfree_threshold => {
                lazyfree.free(entry.value, bytes)
            }
            _ => {
                drop(entry);
                self.memory.sub(bytes);
            }
        }
        true
    }
}

fn expire_at(now: &Now, ttl: Duration) -> u64 {
    now.unix_secs.saturating_add(ttl.as_secs().max(1))
}

impl<C: Clock> Store for KeyspaceStore<C> {
    fn shards(&self) -> usize {
        self.shards.len()
    }

    fn len(&self, shard: usize, keyspace: Keyspace) -> usize {
        self.shards.get(shard).map_or(0, |s| match keyspace {
            Keyspace::Main => s.main.len(),
            Keyspace::Expires => s.expires.len(),
        })
    }

    fn sample(
        &self,
        shard: usize,
        keyspace: Keyspace,
        count: usize,
        visit: &mut dyn FnMut(&[u8], Sampled),
    ) {
        let Some(s) = self.shards.get(shard) else {
            return;
        };
        let mut rng = self.rng.borrow_mut();
        for _ in 0..count {
            match keyspace {
                Keyspace::Main => match s.main.random(&mut *rng) {
                    Some((key, entry)) => visit(key, Sampled::Value(entry.meta)),
                    None => return,
                },
                Keyspace::Expires => match s.expires.random(&mut *rng) {
                    Some((key, at)) => visit(key, Sampled::Expire(*at)),
                    None => return,
                },
            }
        }
    }

    fn access_meta(&self, shard: usize, key: &[u8]) -> Option<AccessMeta> {
        self.meta(shard, key)
    }

    fn contains(&self, shard: usize, keyspace: Keyspace, key: &[u8]) -> bool {
        self.shards.get(shard).is_some_and(|s| match keyspace {
            Keyspace::Main => s.main.contains(key),
            Keyspace::Expires => s.expires.contains(key),
        })
    }

    fn random_key(&self, shard: usize, keyspace: Keyspace) -> Option<Vec<u8>> {
        let s = self.shards.get(shard)?;
        let mut rng = self.rng.borrow_mut();
        match keyspace {
            Keyspace::Main => s.main.random(&mut *rng).map(|(k, _)| k.to_vec()),
            Keyspace::Expires => s.expires.random(&mut *rng).map(|(k, _)| k.to_vec()),
        }
    }

    fn delete_sync(&mut self, shard: usize, key: &[u8]) -> bool {
        self.remove(shard, key, false)
    }

    fn delete_deferred(&mut self, shard: usize, key: &[u8]) -> bool {
        self.remove(shard, key, true)
    }

    fn pending_deferred(&self) -> usize {
        self.pending_frees()
    }
}
