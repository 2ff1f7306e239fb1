//! Host backed by the keyspace's own byte counter.

use crate::memory::MemoryCounter;
use evict::{EvictResult, Host};
use tracing::trace;

/// [`Host`] that reports the bytes charged by a
/// [`KeyspaceStore`](crate::KeyspaceStore) as allocator usage.
///
/// Replication state and pauses are plain flags, set by whoever embeds the
/// store. Replica output flushes and eviction notifications are counted.
#[derive(Debug, Clone, Default)]
pub struct TrackedHost {
    memory: MemoryCounter,
    overhead: u64,
    replicas: bool,
    replica: bool,
    paused: bool,
    suspended: bool,
    flushes: u64,
    evicted: u64,
}

impl TrackedHost {
    pub fn new(memory: MemoryCounter) -> Self {
        Self {
            memory,
            ..Default::default()
        }
    }

    /// Bytes held by replica output and rewrite buffers. They count toward
    /// usage but not toward the budget.
    pub fn set_overhead(&mut self, bytes: u64) {
        self.overhead = bytes;
    }

    pub fn set_replicas(&mut self, attached: bool) {
        self.replicas = attached;
    }

    pub fn set_replica(&mut self, replica: bool) {
        self.replica = replica;
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn set_suspended(&mut self, suspended: bool) {
        self.suspended = suspended;
    }

    /// Replica output flushes requested so far.
    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    /// Keys reported evicted so far.
    pub fn evicted_keys(&self) -> u64 {
        self.evicted
    }
}

impl Host for TrackedHost {
    fn used_bytes(&self) -> EvictResult<u64> {
        Ok(self.memory.get() + self.overhead)
    }

    fn unaccounted_bytes(&self) -> u64 {
        self.overhead
    }

    fn has_replicas(&self) -> bool {
        self.replicas
    }

    fn flush_replica_output(&mut self) {
        self.flushes += 1;
    }

    fn clients_paused(&self) -> bool {
        self.paused
    }

    fn is_replica(&self) -> bool {
        self.replica
    }

    fn eviction_suspended(&self) -> bool {
        self.suspended
    }

    fn evicted(&mut self, shard: usize, key: &[u8]) {
        self.evicted += 1;
        trace!(shard, key_len = key.len(), "evicted");
    }
}
