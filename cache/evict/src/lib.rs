//! evict: sampled approximate eviction for in-memory keyspaces.
//!
//! Keeps a key-value store under a byte budget by evicting the "least
//! valuable" keys under a configurable policy, without ever ordering the
//! whole keyspace. A handful of random samples per shard feed a small
//! persistent candidate pool, and the best candidate in the pool is evicted.
//!
//! - **Policy**: `EvictionPolicy`, LRU/LFU/TTL/random over all keys or only
//!   volatile ones
//! - **Access metadata**: `AccessMeta`, `AccessTracker`, 24-bit LRU clock or
//!   decaying logarithmic LFU counter
//! - **Estimation**: `Estimator`, maps a sample to a comparable priority
//! - **Pool**: `EvictionPool`, 16 candidates in ascending priority
//! - **Accounting**: `MemoryAccountant`, budget checks net of replication
//!   buffers
//! - **Driver**: `EvictionEngine`, the evict loop
//!
//! # Architecture
//!
//! ```text
//!   +------------------+        +-------------------+
//!   |  Host            |        |  Store            |
//!   | (allocator,      |        | (shards: main +   |
//!   |  replication)    |        |  expires tables)  |
//!   +--------+---------+        +----+---------+----+
//!            | used_bytes            | sample  | delete
//!            v                       v         ^
//!   +------------------+   +-----------------+ |
//!   | MemoryAccountant |   | Sampler         | |
//!   +--------+---------+   |   -> Estimator  | |
//!            |             +--------+--------+ |
//!            v                      v          |
//!   +-------------------------------------------+
//!   |             EvictionEngine                |
//!   |   EvictionPool (16 slots, persistent)     |
//!   +-------------------------------------------+
//! ```
//!
//! # Example
//!
//! ```ignore
//! use evict::*;
//!
//! let config = EvictionConfig::new()
//!     .with_policy(EvictionPolicy::AllkeysLfu)
//!     .with_maxmemory(64 * 1024 * 1024);
//! let mut engine = EvictionEngine::new(config)?;
//!
//! // before every write
//! if engine.ensure_within_budget(&mut store, &mut host)?.is_blocked() {
//!     return Err(OutOfMemory);
//! }
//! ```

#![warn(clippy::all)]

mod clock;
mod config;
mod engine;
mod error;
mod estimate;
pub mod lfu;
mod memory;
mod meta;
pub mod metrics;
mod policy;
mod pool;
mod sampler;
mod store;

pub use clock::{
    Clock, CoarseClock, LRU_CLOCK_BITS, LRU_CLOCK_MAX, LRU_CLOCK_RESOLUTION_MS, ManualClock, Now,
    lru_clock,
};
pub use config::{
    DEFAULT_DEFERRED_WAIT_LIMIT_MS, DEFAULT_SAMPLES, EvictionConfig, MAX_SAMPLES, parse_size,
};
pub use engine::{
    BlockReason, DEFERRED_POLL_INTERVAL, EvictionEngine, EvictionStats, LAZYFREE_CHECK_INTERVAL,
    OUTPUT_FLUSH_BATCH, Outcome,
};
pub use error::{EvictError, EvictResult};
pub use estimate::{Estimator, idle_time_ms, lfu_priority, ttl_priority};
pub use memory::{Host, MemoryAccountant, MemoryPressure, MemoryState, Overage, SystemHost};
pub use meta::{AccessMeta, AccessTracker};
pub use policy::EvictionPolicy;
pub use pool::{Candidate, EVPOOL_CACHED_KEY_LEN, EVPOOL_SIZE, EvictionPool, Selection};
pub use sampler::Sampler;
pub use store::{Keyspace, Sampled, Store};
