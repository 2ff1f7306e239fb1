//! The keyspace seam.
//!
//! The engine never owns data. It reads and deletes through [`Store`], which
//! the embedding key-value store implements over its own tables.

use crate::meta::AccessMeta;

/// Which table of a shard to sample or look up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyspace {
    /// The primary key table.
    Main,
    /// Only the keys that carry an expiration.
    Expires,
}

/// Value handed to the sampler for each sampled key.
///
/// Sampling the main table yields the key's access metadata. Sampling the
/// expires table yields its absolute expiration in unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sampled {
    Value(AccessMeta),
    Expire(u64),
}

/// Operations the engine needs from a sharded key-value store.
///
/// All keyspaces are addressed by `(shard, keyspace)`. A shard is an
/// independent database; a store with a single database reports one shard.
///
/// Implementations are driven from a single thread for the duration of an
/// eviction cycle.
pub trait Store {
    /// Number of independent shards.
    fn shards(&self) -> usize;

    /// Number of keys in the given keyspace of a shard.
    fn len(&self, shard: usize, keyspace: Keyspace) -> usize;

    /// Visit up to `count` random entries of a keyspace.
    ///
    /// Best effort: duplicates are allowed and fewer than `count` entries
    /// may be visited.
    fn sample(
        &self,
        shard: usize,
        keyspace: Keyspace,
        count: usize,
        visit: &mut dyn FnMut(&[u8], Sampled),
    );

    /// Access metadata of a key in the main table.
    fn access_meta(&self, shard: usize, key: &[u8]) -> Option<AccessMeta>;

    /// Whether the key is still present in the given keyspace.
    fn contains(&self, shard: usize, keyspace: Keyspace, key: &[u8]) -> bool;

    /// A uniformly random key from the keyspace, if any.
    fn random_key(&self, shard: usize, keyspace: Keyspace) -> Option<Vec<u8>>;

    /// Remove a key and reclaim its memory now.
    ///
    /// Returns `false` if the key was not present.
    fn delete_sync(&mut self, shard: usize, key: &[u8]) -> bool;

    /// Remove a key immediately but reclaim its memory in the background.
    ///
    /// The key must be unreachable as soon as this returns.
    fn delete_deferred(&mut self, shard: usize, key: &[u8]) -> bool {
        self.delete_sync(shard, key)
    }

    /// Number of deferred deletions not yet reclaimed.
    fn pending_deferred(&self) -> usize {
        0
    }
}
