//! Workload loop.
//!
//! Every operation is a GET of a key drawn from a hot/cold mix. A miss is
//! followed by a SET of the same key, preceded by a budget check that may
//! evict. SETs the engine refuses are counted and skipped.

use crate::config::Config;
use crate::metrics;

use evict::{Clock, EvictionEngine, Host, MemoryPressure, Outcome};
use keyspace::KeyspaceStore;
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::time::{Duration, Instant};
use tracing::info;

/// Totals for one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub operations: u64,
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub blocked: u64,
    pub evicted: u64,
    pub expired: u64,
    pub keys: usize,
    pub memory: u64,
    pub pressure: MemoryPressure,
    pub elapsed: Duration,
}

impl Summary {
    pub fn hit_ratio(&self) -> f64 {
        let gets = self.hits + self.misses;
        if gets > 0 {
            self.hits as f64 / gets as f64
        } else {
            0.0
        }
    }

    pub fn log(&self) {
        let rate = if self.elapsed.as_secs_f64() > 0.0 {
            self.operations as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        };
        info!(
            operations = self.operations,
            ops_per_sec = rate as u64,
            hit_ratio = self.hit_ratio(),
            sets = self.sets,
            blocked = self.blocked,
            evicted = self.evicted,
            expired = self.expired,
            "workload complete"
        );
        info!(
            keys = self.keys,
            memory = self.memory,
            usage_ratio = self.pressure.usage_ratio,
            over_budget = self.pressure.over_budget,
            "final memory pressure"
        );
    }
}

/// Run the configured workload against `store`.
pub fn run<C, H>(
    config: &Config,
    store: &mut KeyspaceStore<C>,
    engine: &mut EvictionEngine,
    host: &mut H,
) -> Result<Summary, Box<dyn std::error::Error>>
where
    C: Clock,
    H: Host,
{
    let workload = &config.workload;
    let key_count = workload.keys;
    let hot_keys = workload.hot_keys();
    let shards = store.shard_count();
    let ttl = Duration::from_secs(workload.ttl);
    let report_every = (config.general.operations / 10).max(1);

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.general.seed);
    let mut key_buf = vec![0u8; workload.key_length];
    let mut value_buf = vec![0u8; workload.value_length];
    rng.fill_bytes(&mut value_buf);

    let mut hits = 0;
    let mut misses = 0;
    let mut sets = 0;
    let mut blocked = 0;

    let start = Instant::now();

    for op in 0..config.general.operations {
        let key_id = if rng.random_range(0..100) < workload.hot_weight {
            rng.random_range(0..hot_keys)
        } else {
            rng.random_range(0..key_count)
        };
        write_key(&mut key_buf, key_id);
        let shard = key_id % shards;

        let get_start = Instant::now();
        let hit = store.get(shard, &key_buf).is_some();
        let _ = metrics::GET_LATENCY.increment(get_start.elapsed().as_nanos() as u64);
        metrics::GET_COUNT.increment();

        if hit {
            hits += 1;
            metrics::CACHE_HITS.increment();
        } else {
            misses += 1;
            metrics::CACHE_MISSES.increment();

            let evict_start = Instant::now();
            let outcome = engine.ensure_within_budget(store, host)?;
            let _ = metrics::EVICT_LATENCY.increment(evict_start.elapsed().as_nanos() as u64);

            match outcome {
                Outcome::Ok => {
                    let volatile = rng.random_range(0..100) < workload.volatile_percent;
                    let set_start = Instant::now();
                    store.set(shard, &key_buf, &value_buf, volatile.then_some(ttl))?;
                    let _ = metrics::SET_LATENCY.increment(set_start.elapsed().as_nanos() as u64);
                    metrics::SET_COUNT.increment();
                    sets += 1;
                }
                Outcome::Blocked(_) => {
                    metrics::SET_BLOCKED.increment();
                    blocked += 1;
                }
            }
        }

        if (op + 1) % report_every == 0 {
            let pressure = engine.memory_pressure(host)?;
            info!(
                operations = op + 1,
                hits,
                misses,
                blocked,
                keys = store.total_len(),
                usage_ratio = pressure.usage_ratio,
                "progress"
            );
        }
    }

    let elapsed = start.elapsed();
    store.wait_lazyfree();

    Ok(Summary {
        operations: config.general.operations,
        hits,
        misses,
        sets,
        blocked,
        evicted: engine.stats().evicted_keys,
        expired: store.stats().expired,
        keys: store.total_len(),
        memory: store.memory(),
        pressure: engine.memory_pressure(host)?,
        elapsed,
    })
}

/// Write a numeric key ID into the buffer as hex.
fn write_key(buf: &mut [u8], id: usize) {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut n = id;
    for byte in buf.iter_mut().rev() {
        *byte = HEX[n & 0xf];
        n >>= 4;
    }
}
