//! The eviction driver.
//!
//! [`EvictionEngine::ensure_within_budget`] is called before every operation
//! that may grow memory. While usage is over budget it repeatedly picks the
//! best victim and deletes it:
//!
//! ```text
//!   check budget ──under──> Ok
//!        │ over
//!        v
//!   populate pool (every shard) ──no keys──> Blocked
//!        │
//!        v
//!   select from best slot down ──all ghosts──> populate again
//!        │ victim
//!        v
//!   delete (sync or deferred), credit before/after delta
//!        │
//!        └── freed < to_free ──> populate again
//! ```
//!
//! Random policies skip the pool and take a random key from the next shard
//! in round-robin order.

use crate::clock::{Clock, CoarseClock, Now};
use crate::config::EvictionConfig;
use crate::error::EvictResult;
use crate::estimate::Estimator;
use crate::memory::{Host, MemoryAccountant, MemoryPressure, MemoryState, Overage};
use crate::metrics::*;
use crate::pool::EvictionPool;
use crate::sampler::Sampler;
use crate::store::Store;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// With deferred deletion, re-read usage after this many deletions.
pub const LAZYFREE_CHECK_INTERVAL: u64 = 16;

/// Flush replica output after this many deletions.
pub const OUTPUT_FLUSH_BATCH: u64 = 16;

/// Poll interval while waiting for background frees.
pub const DEFERRED_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Result of an eviction cycle.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Usage is within budget, or eviction does not apply right now.
    Ok,
    /// Usage could not be brought under budget. The triggering write should
    /// be rejected.
    Blocked(BlockReason),
}

impl Outcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok)
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Outcome::Blocked(_))
    }
}

/// Why a cycle ended [`Blocked`](Outcome::Blocked).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    /// The policy forbids eviction.
    NoEviction,
    /// No evictable key could be found.
    NoCandidates,
}

/// Counters for one engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionStats {
    pub evicted_keys: u64,
    pub bytes_freed: u64,
    pub cycles: u64,
    pub blocked: u64,
    pub ghosts: u64,
}

/// Keeps a store under its memory budget.
///
/// Owns the candidate pool and the round-robin shard cursor. One engine
/// serves one store; it must not be driven from more than one thread at a
/// time.
#[derive(Debug)]
pub struct EvictionEngine<C = CoarseClock> {
    config: EvictionConfig,
    accountant: MemoryAccountant,
    sampler: Sampler,
    estimator: Estimator,
    pool: EvictionPool,
    next_shard: usize,
    victim: Vec<u8>,
    clock: C,
    stats: EvictionStats,
}

impl EvictionEngine<CoarseClock> {
    pub fn new(config: EvictionConfig) -> EvictResult<Self> {
        Self::with_clock(config, CoarseClock)
    }
}

impl<C: Clock> EvictionEngine<C> {
    pub fn with_clock(config: EvictionConfig, clock: C) -> EvictResult<Self> {
        config.validate()?;
        Ok(Self {
            accountant: MemoryAccountant::new(config.maxmemory),
            sampler: Sampler::new(config.samples),
            estimator: Estimator::new(config.policy, config.lfu_decay_time),
            pool: EvictionPool::new(),
            next_shard: 0,
            victim: Vec::new(),
            clock,
            stats: EvictionStats::default(),
            config,
        })
    }

    pub fn config(&self) -> &EvictionConfig {
        &self.config
    }

    pub fn stats(&self) -> EvictionStats {
        self.stats
    }

    pub fn pool(&self) -> &EvictionPool {
        &self.pool
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Apply a new configuration.
    ///
    /// Takes effect on the next call. Changing policy empties the pool, since
    /// priorities from different policies are not comparable.
    pub fn set_config(&mut self, config: EvictionConfig) -> EvictResult<()> {
        config.validate()?;
        if config.policy != self.config.policy {
            debug!(from = %self.config.policy, to = %config.policy, "eviction policy changed");
            self.pool.clear();
        }
        self.accountant = MemoryAccountant::new(config.maxmemory);
        self.sampler = Sampler::new(config.samples);
        self.estimator = Estimator::new(config.policy, config.lfu_decay_time);
        self.config = config;
        Ok(())
    }

    /// Usage ratio and whether the budget is exceeded. Read only.
    pub fn memory_pressure<H: Host + ?Sized>(&self, host: &H) -> EvictResult<MemoryPressure> {
        self.accountant.state(host).map(MemoryPressure::from)
    }

    /// Full memory report. Read only.
    pub fn memory_state<H: Host + ?Sized>(&self, host: &H) -> EvictResult<MemoryState> {
        self.accountant.state(host)
    }

    /// Evict keys until usage is within budget.
    ///
    /// Returns [`Outcome::Blocked`] when the budget cannot be met. Errors only
    /// if memory usage cannot be read.
    pub fn ensure_within_budget<S, H>(
        &mut self,
        store: &mut S,
        host: &mut H,
    ) -> EvictResult<Outcome>
    where
        S: Store + ?Sized,
        H: Host + ?Sized,
    {
        if !self.safe_to_evict(host) {
            return Ok(Outcome::Ok);
        }

        let Some(overage) = self.accountant.overage(host)? else {
            return Ok(Outcome::Ok);
        };

        if !self.config.policy.evicts() {
            return Ok(self.blocked(BlockReason::NoEviction, &overage, 0));
        }

        let start = Instant::now();
        self.stats.cycles += 1;
        EVICTION_CYCLES.increment();

        let result = self.run(store, host, &overage);

        let _ = EVICTION_CYCLE_LATENCY.increment(start.elapsed().as_nanos() as u64);

        let (outcome, freed, keys_freed) = result?;
        match outcome {
            Outcome::Ok => {
                debug!(
                    policy = %self.config.policy,
                    keys = keys_freed,
                    freed,
                    to_free = overage.to_free,
                    "eviction cycle complete"
                );
                Ok(Outcome::Ok)
            }
            Outcome::Blocked(reason) => Ok(self.blocked(reason, &overage, freed)),
        }
    }

    fn safe_to_evict<H: Host + ?Sized>(&self, host: &H) -> bool {
        if host.eviction_suspended() {
            return false;
        }
        if host.is_replica() && self.config.replica_ignore_maxmemory {
            return false;
        }
        !host.clients_paused()
    }

    fn blocked(&mut self, reason: BlockReason, overage: &Overage, freed: u64) -> Outcome {
        self.stats.blocked += 1;
        EVICTION_BLOCKED.increment();
        match reason {
            BlockReason::NoEviction => {
                debug!(
                    used = overage.logical,
                    budget = self.accountant.budget(),
                    "over budget with eviction disabled"
                );
            }
            BlockReason::NoCandidates => {
                warn!(
                    policy = %self.config.policy,
                    used = overage.logical,
                    budget = self.accountant.budget(),
                    freed,
                    "unable to free memory: no evictable keys"
                );
            }
        }
        Outcome::Blocked(reason)
    }

    /// The delete loop. Returns the outcome, bytes freed and keys evicted.
    fn run<S, H>(
        &mut self,
        store: &mut S,
        host: &mut H,
        overage: &Overage,
    ) -> EvictResult<(Outcome, u64, u64)>
    where
        S: Store + ?Sized,
        H: Host + ?Sized,
    {
        let lazy = self.config.lazyfree_lazy_eviction;
        let mut freed: u64 = 0;
        let mut keys_freed: u64 = 0;

        while freed < overage.to_free {
            if keys_freed > 0 && host.clients_paused() {
                return Ok((Outcome::Ok, freed, keys_freed));
            }

            let victim = if self.config.policy.uses_pool() {
                self.select_from_pool(store)
            } else {
                self.select_random(store)
            };

            let Some(shard) = victim else {
                return self
                    .wait_for_deferred(store, host, overage, freed)
                    .map(|outcome| (outcome, freed, keys_freed));
            };

            let before = host.used_bytes()?;
            let del_start = Instant::now();
            let removed = if lazy {
                store.delete_deferred(shard, &self.victim)
            } else {
                store.delete_sync(shard, &self.victim)
            };
            let _ = EVICTION_DELETE_LATENCY.increment(del_start.elapsed().as_nanos() as u64);
            let after = host.used_bytes()?;

            if !removed {
                return self
                    .wait_for_deferred(store, host, overage, freed)
                    .map(|outcome| (outcome, freed, keys_freed));
            }

            let delta = before.saturating_sub(after);
            freed += delta;
            keys_freed += 1;

            self.stats.evicted_keys += 1;
            self.stats.bytes_freed += delta;
            EVICTED_KEYS.increment();
            EVICTION_BYTES_FREED.add(delta);

            trace!(shard, key_len = self.victim.len(), freed = delta, "evicted key");
            host.evicted(shard, &self.victim);

            if host.has_replicas() && keys_freed.is_multiple_of(OUTPUT_FLUSH_BATCH) {
                host.flush_replica_output();
            }

            // Deferred frees are credited only for the delta seen at deletion
            // time, so check the real figure now and then.
            if lazy
                && keys_freed.is_multiple_of(LAZYFREE_CHECK_INTERVAL)
                && self.accountant.overage(host)?.is_none()
            {
                break;
            }
        }

        Ok((Outcome::Ok, freed, keys_freed))
    }

    /// Pick the best live candidate, repopulating as needed. The key is left
    /// in `self.victim`.
    fn select_from_pool<S: Store + ?Sized>(&mut self, store: &S) -> Option<usize> {
        let keyspace = self.config.policy.keyspace();

        loop {
            let now = Now::read(&self.clock);
            let started_empty = self.pool.is_empty();
            let mut total_keys = 0;
            let mut inserted = 0;

            for shard in 0..store.shards() {
                let keys = store.len(shard, keyspace);
                if keys != 0 {
                    inserted += self.sampler.populate(
                        store,
                        shard,
                        keyspace,
                        &self.estimator,
                        &now,
                        &mut self.pool,
                    );
                    total_keys += keys;
                }
            }

            if total_keys == 0 {
                // Whatever is left in the pool refers to deleted keys.
                self.record_ghosts(self.pool.len());
                self.pool.clear();
                return None;
            }

            let selection = self.pool.select(
                |shard, key| store.contains(shard, keyspace, key),
                &mut self.victim,
            );
            self.record_ghosts(selection.ghosts);

            if selection.victim.is_some() {
                return selection.victim;
            }

            // Nothing estimable was sampled into an empty pool; retrying
            // would spin.
            if started_empty && inserted == 0 {
                return None;
            }
        }
    }

    fn select_random<S: Store + ?Sized>(&mut self, store: &S) -> Option<usize> {
        let keyspace = self.config.policy.keyspace();
        let shards = store.shards();

        for _ in 0..shards {
            self.next_shard = self.next_shard.wrapping_add(1);
            let shard = self.next_shard % shards;
            if store.len(shard, keyspace) != 0
                && let Some(key) = store.random_key(shard, keyspace)
            {
                self.victim = key;
                return Some(shard);
            }
        }
        None
    }

    fn record_ghosts(&mut self, ghosts: usize) {
        if ghosts > 0 {
            self.stats.ghosts += ghosts as u64;
            EVICTION_GHOSTS.add(ghosts as u64);
        }
    }

    /// Nothing more can be deleted. If background frees are still queued,
    /// poll until they cover the shortfall, the queue drains, or the wait
    /// limit is reached.
    fn wait_for_deferred<S, H>(
        &self,
        store: &S,
        host: &H,
        overage: &Overage,
        freed: u64,
    ) -> EvictResult<Outcome>
    where
        S: Store + ?Sized,
        H: Host + ?Sized,
    {
        let limit = Duration::from_millis(self.config.deferred_wait_limit_ms);
        let mut waited = Duration::ZERO;

        while store.pending_deferred() > 0 {
            if self.reclaimed(host, overage, freed)? {
                return Ok(Outcome::Ok);
            }
            if waited >= limit {
                return Ok(Outcome::Blocked(BlockReason::NoCandidates));
            }
            self.clock.sleep(DEFERRED_POLL_INTERVAL);
            waited += DEFERRED_POLL_INTERVAL;
        }

        if !waited.is_zero() && self.reclaimed(host, overage, freed)? {
            return Ok(Outcome::Ok);
        }
        Ok(Outcome::Blocked(BlockReason::NoCandidates))
    }

    fn reclaimed<H: Host + ?Sized>(
        &self,
        host: &H,
        overage: &Overage,
        freed: u64,
    ) -> EvictResult<bool> {
        let used = host.used_bytes()?;
        Ok(overage.total.saturating_sub(used) + freed >= overage.to_free)
    }
}
