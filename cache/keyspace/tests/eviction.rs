//! End-to-end eviction over a real keyspace.

use evict::{BlockReason, EvictionConfig, EvictionEngine, EvictionPolicy, ManualClock, Outcome};
use keyspace::{ENTRY_OVERHEAD, EXPIRE_OVERHEAD, KeyspaceStore, TrackedHost};
use std::sync::Arc;
use std::time::Duration;

const START: u64 = 1_000_000;
const SHARDS: usize = 2;
const KEYS: usize = 100;
const VALUE: [u8; 100] = [0xAB; 100];
/// Charge of one persistent entry: 8 byte key, 100 byte value.
const COST: u64 = 8 + 100 + ENTRY_OVERHEAD;

fn key(i: usize) -> Vec<u8> {
    format!("key:{i:04}").into_bytes()
}

fn shard(i: usize) -> usize {
    i % SHARDS
}

struct Harness {
    store: KeyspaceStore<Arc<ManualClock>>,
    host: TrackedHost,
    engine: EvictionEngine<Arc<ManualClock>>,
    clock: Arc<ManualClock>,
}

impl Harness {
    fn new(policy: EvictionPolicy) -> Self {
        let config = EvictionConfig::new()
            .with_policy(policy)
            .with_lfu_log_factor(0)
            .with_seed(42);
        let clock = Arc::new(ManualClock::new(START));
        let store = KeyspaceStore::builder()
            .shards(SHARDS)
            .eviction(&config)
            .clock(clock.clone())
            .build()
            .unwrap();
        let host = TrackedHost::new(store.memory_counter());
        let engine = EvictionEngine::with_clock(config, clock.clone()).unwrap();
        Self {
            store,
            host,
            engine,
            clock,
        }
    }

    /// Insert keys one second apart; every `volatile_every`-th key gets a TTL
    /// of `100 + i` seconds.
    fn fill(&mut self, volatile_every: Option<usize>) {
        for i in 0..KEYS {
            let ttl = volatile_every
                .filter(|n| i % n == 0)
                .map(|_| Duration::from_secs(100 + i as u64));
            self.store.set(shard(i), &key(i), &VALUE, ttl).unwrap();
            self.clock.advance(Duration::from_secs(1));
        }
    }

    fn set_budget(&mut self, maxmemory: u64) {
        let config = self.engine.config().clone().with_maxmemory(maxmemory);
        self.engine.set_config(config).unwrap();
    }

    fn evict(&mut self) -> Outcome {
        self.engine
            .ensure_within_budget(&mut self.store, &mut self.host)
            .unwrap()
    }

    fn survivors(&self) -> Vec<usize> {
        (0..KEYS)
            .filter(|i| self.store.contains_key(shard(*i), &key(*i)))
            .collect()
    }
}

#[test]
fn test_under_budget_is_noop() {
    let mut h = Harness::new(EvictionPolicy::AllkeysLru);
    h.fill(None);
    h.set_budget(KEYS as u64 * COST);

    assert_eq!(h.evict(), Outcome::Ok);
    assert_eq!(h.store.total_len(), KEYS);
    assert_eq!(h.engine.stats().cycles, 0);
}

#[test]
fn test_allkeys_lru_keeps_recent_keys() {
    let mut h = Harness::new(EvictionPolicy::AllkeysLru);
    h.fill(None);

    // touch the oldest ten so they become the most recent
    h.clock.advance(Duration::from_secs(10));
    for i in 0..10 {
        assert!(h.store.get(shard(i), &key(i)).is_some());
    }

    h.set_budget(50 * COST);
    assert_eq!(h.evict(), Outcome::Ok);

    assert_eq!(h.store.total_len(), 50);
    assert_eq!(h.store.memory(), 50 * COST);
    assert_eq!(h.engine.stats().evicted_keys, 50);
    assert_eq!(h.engine.stats().bytes_freed, 50 * COST);
    assert_eq!(h.host.evicted_keys(), 50);

    let survivors = h.survivors();
    let hot = survivors.iter().filter(|i| **i < 10).count();
    assert!(hot >= 9, "only {hot} recently used keys survived");

    let cold: Vec<usize> = survivors.into_iter().filter(|i| *i >= 10).collect();
    let mean = cold.iter().sum::<usize>() as f64 / cold.len() as f64;
    assert!(mean > 60.0, "survivors skew old: mean index {mean}");
}

#[test]
fn test_allkeys_lfu_keeps_frequent_keys() {
    let mut h = Harness::new(EvictionPolicy::AllkeysLfu);
    h.fill(None);

    for _ in 0..20 {
        for i in 0..10 {
            h.store.get(shard(i), &key(i));
        }
    }
    // decayed on first touch, then one point per hit
    assert!(h.store.meta(0, &key(0)).unwrap().counter() >= 20);

    h.set_budget(50 * COST);
    assert_eq!(h.evict(), Outcome::Ok);
    assert_eq!(h.store.total_len(), 50);

    let hot = h.survivors().iter().filter(|i| **i < 10).count();
    assert!(hot >= 9, "only {hot} frequently used keys survived");
}

#[test]
fn test_volatile_ttl_spares_persistent_keys() {
    let mut h = Harness::new(EvictionPolicy::VolatileTtl);
    h.fill(Some(2));
    assert_eq!(h.store.total_volatile(), 50);

    let used = h.store.memory();
    assert_eq!(used, KEYS as u64 * COST + 50 * EXPIRE_OVERHEAD);

    h.set_budget(used - 20 * (COST + EXPIRE_OVERHEAD));
    assert_eq!(h.evict(), Outcome::Ok);

    assert_eq!(h.store.total_volatile(), 30);
    let survivors = h.survivors();
    assert!((0..KEYS).filter(|i| i % 2 == 1).all(|i| survivors.contains(&i)));

    // shortest remaining TTLs go first
    let volatile: Vec<usize> = survivors.into_iter().filter(|i| i % 2 == 0).collect();
    let mean = volatile.iter().sum::<usize>() as f64 / volatile.len() as f64;
    assert!(mean > 49.0, "kept short TTLs: mean index {mean}");
}

#[test]
fn test_volatile_random_spares_persistent_keys() {
    let mut h = Harness::new(EvictionPolicy::VolatileRandom);
    h.fill(Some(2));
    let used = h.store.memory();

    h.set_budget(used - 10 * (COST + EXPIRE_OVERHEAD));
    assert_eq!(h.evict(), Outcome::Ok);

    assert_eq!(h.store.total_volatile(), 40);
    assert_eq!(h.store.total_len(), 90);
}

#[test]
fn test_allkeys_random_meets_budget() {
    let mut h = Harness::new(EvictionPolicy::AllkeysRandom);
    h.fill(None);
    h.set_budget(30 * COST);

    assert_eq!(h.evict(), Outcome::Ok);
    assert_eq!(h.store.total_len(), 30);
    assert!(h.store.memory() <= 30 * COST);
}

#[test]
fn test_noeviction_blocks_writes() {
    let mut h = Harness::new(EvictionPolicy::Noeviction);
    h.fill(None);
    h.set_budget(10 * COST);

    assert_eq!(h.evict(), Outcome::Blocked(BlockReason::NoEviction));
    assert_eq!(h.store.total_len(), KEYS);
}

#[test]
fn test_volatile_policy_without_volatile_keys_blocks() {
    let mut h = Harness::new(EvictionPolicy::VolatileLru);
    h.fill(None);
    h.set_budget(10 * COST);

    assert_eq!(h.evict(), Outcome::Blocked(BlockReason::NoCandidates));
    assert_eq!(h.store.total_len(), KEYS);
}

#[test]
fn test_evict_everything_and_ignore_overhead() {
    let mut h = Harness::new(EvictionPolicy::AllkeysLru);
    h.fill(None);
    h.set_budget(1);

    // a single key still exceeds one byte
    assert_eq!(h.evict(), Outcome::Ok);
    assert_eq!(h.store.total_len(), 0);
    assert_eq!(h.store.memory(), 0);

    // replica buffers alone never trigger eviction
    h.set_budget(5 * COST);
    h.host.set_overhead(10 * COST);
    h.store.set(0, b"k", &VALUE, None).unwrap();
    assert_eq!(h.evict(), Outcome::Ok);
    assert_eq!(h.store.total_len(), 1);

    h.set_budget(1);
    assert_eq!(h.evict(), Outcome::Ok);
    assert_eq!(h.store.total_len(), 0);
}

#[test]
fn test_replica_output_flushed_in_batches() {
    let mut h = Harness::new(EvictionPolicy::AllkeysLru);
    h.fill(None);
    h.host.set_replicas(true);
    h.set_budget(60 * COST);

    assert_eq!(h.evict(), Outcome::Ok);
    assert_eq!(h.host.evicted_keys(), 40);
    assert_eq!(h.host.flushes(), 2);
}

#[test]
fn test_replica_leaves_eviction_to_primary() {
    let mut h = Harness::new(EvictionPolicy::AllkeysLru);
    h.fill(None);
    h.host.set_replica(true);
    h.set_budget(10 * COST);

    assert_eq!(h.evict(), Outcome::Ok);
    assert_eq!(h.store.total_len(), KEYS);
}

#[test]
fn test_policy_switch_at_runtime() {
    let mut h = Harness::new(EvictionPolicy::AllkeysLru);
    h.fill(Some(4));
    h.set_budget(90 * COST);
    assert_eq!(h.evict(), Outcome::Ok);

    let config = h
        .engine
        .config()
        .clone()
        .with_policy(EvictionPolicy::VolatileRandom)
        .with_maxmemory(1);
    h.store.set_eviction(&config);
    h.engine.set_config(config).unwrap();
    assert!(h.engine.pool().is_empty());

    assert_eq!(h.evict(), Outcome::Blocked(BlockReason::NoCandidates));
    assert_eq!(h.store.total_volatile(), 0);
    assert!(h.store.total_len() > 0);
}

/// Deferred frees are not credited while the deleter lags, so the cycle
/// keeps deleting and then waits for the queue.
#[test]
fn test_lazy_eviction_with_background_worker() {
    let config = EvictionConfig::new()
        .with_policy(EvictionPolicy::AllkeysLru)
        .with_lazy_eviction(true)
        .with_seed(3);
    let mut store = KeyspaceStore::builder()
        .shards(SHARDS)
        .eviction(&config)
        .lazyfree_threshold(0)
        .lazyfree_delay(Duration::from_millis(1))
        .build()
        .unwrap();
    for i in 0..KEYS {
        store.set(shard(i), &key(i), &VALUE, None).unwrap();
    }
    let mut host = TrackedHost::new(store.memory_counter());
    let mut engine = EvictionEngine::new(config.with_maxmemory(50 * COST)).unwrap();

    let outcome = engine.ensure_within_budget(&mut store, &mut host).unwrap();
    assert_eq!(outcome, Outcome::Ok);

    store.wait_lazyfree();
    assert_eq!(store.pending_frees(), 0);
    assert!(store.memory() <= 50 * COST);
    assert_eq!(store.memory(), store.total_len() as u64 * COST);
}
