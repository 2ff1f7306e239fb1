//! Sharded in-memory keyspace driven by the `evict` engine.
//!
//! # Architecture
//!
//! ```text
//! +------------------------------------------+
//! |             KeyspaceStore                |
//! |                                          |
//! |  shard 0 .. shard N-1                    |
//! |  +------------------------------------+  |
//! |  | main:    key -> (value, meta)      |  |
//! |  | expires: key -> unix seconds       |  |
//! |  +------------------------------------+  |
//! |        |                                 |
//! |        v                                 |
//! |  +------------------------------------+  |
//! |  | MemoryCounter (shared)             |  |
//! |  +------------------------------------+  |
//! |        ^                     ^           |
//! |        |                     |           |
//! |  LazyFree worker        TrackedHost      |
//! +------------------------------------------+
//! ```
//!
//! Each table is dense, so sampling a uniform random key is O(1). Every entry
//! charges its key, value and a fixed overhead to the shared counter.
//! [`TrackedHost`] reports that counter as allocator usage, which lets the
//! engine account for evictions exactly and deterministically.
//!
//! # Example
//!
//! ```ignore
//! use evict::{EvictionConfig, EvictionEngine, EvictionPolicy};
//! use keyspace::{KeyspaceStore, TrackedHost};
//!
//! let config = EvictionConfig::new()
//!     .with_policy(EvictionPolicy::AllkeysLru)
//!     .with_maxmemory(64 * 1024 * 1024);
//!
//! let mut store = KeyspaceStore::builder().shards(4).eviction(&config).build()?;
//! let mut host = TrackedHost::new(store.memory_counter());
//! let mut engine = EvictionEngine::new(config)?;
//!
//! if engine.ensure_within_budget(&mut store, &mut host)?.is_ok() {
//!     store.set(0, b"key", b"value", None)?;
//! }
//! ```

#![warn(clippy::all)]

mod error;
mod host;
mod lazyfree;
mod memory;
mod store;
mod table;

pub use error::{KeyspaceError, KeyspaceResult};
pub use host::TrackedHost;
pub use lazyfree::LazyFree;
pub use memory::{ENTRY_OVERHEAD, EXPIRE_OVERHEAD, MemoryCounter, entry_size};
pub use store::{DEFAULT_LAZYFREE_THRESHOLD, KeyspaceBuilder, KeyspaceStats, KeyspaceStore};
pub use table::Table;
