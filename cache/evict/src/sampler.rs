//! Feeds random samples from a shard into the candidate pool.

use crate::clock::Now;
use crate::estimate::Estimator;
use crate::pool::EvictionPool;
use crate::store::{Keyspace, Sampled, Store};

/// Draws a fixed number of random entries per shard.
#[derive(Debug, Clone, Copy)]
pub struct Sampler {
    count: usize,
}

impl Sampler {
    pub fn new(count: usize) -> Self {
        Self { count }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Sample `keyspace` of one shard and offer every estimable entry to the
    /// pool. Returns the number of entries the pool accepted.
    ///
    /// Entries sampled from the expires table are ranked by their access
    /// metadata, looked up in the main table, unless the policy ranks by
    /// expiration itself.
    pub fn populate<S: Store + ?Sized>(
        &self,
        store: &S,
        shard: usize,
        keyspace: Keyspace,
        estimator: &Estimator,
        now: &Now,
        pool: &mut EvictionPool,
    ) -> usize {
        let resolve_meta = keyspace == Keyspace::Expires && !estimator.policy().is_ttl();
        let mut inserted = 0;

        store.sample(shard, keyspace, self.count, &mut |key, sampled| {
            let sampled = match sampled {
                Sampled::Expire(_) if resolve_meta => match store.access_meta(shard, key) {
                    Some(meta) => Sampled::Value(meta),
                    None => return,
                },
                other => other,
            };
            if let Some(priority) = estimator.estimate(sampled, now)
                && pool.insert(priority, shard, key)
            {
                inserted += 1;
            }
        });

        inserted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::AccessMeta;
    use crate::policy::EvictionPolicy;
    use std::collections::BTreeMap;

    /// Single-shard store that visits entries in key order.
    #[derive(Default)]
    struct OrderedStore {
        main: BTreeMap<Vec<u8>, AccessMeta>,
        expires: BTreeMap<Vec<u8>, u64>,
    }

    impl Store for OrderedStore {
        fn shards(&self) -> usize {
            1
        }

        fn len(&self, _shard: usize, keyspace: Keyspace) -> usize {
            match keyspace {
                Keyspace::Main => self.main.len(),
                Keyspace::Expires => self.expires.len(),
            }
        }

        fn sample(
            &self,
            _shard: usize,
            keyspace: Keyspace,
            count: usize,
            visit: &mut dyn FnMut(&[u8], Sampled),
        ) {
            match keyspace {
                Keyspace::Main => self
                    .main
                    .iter()
                    .take(count)
                    .for_each(|(k, m)| visit(k, Sampled::Value(*m))),
                Keyspace::Expires => self
                    .expires
                    .iter()
                    .take(count)
                    .for_each(|(k, at)| visit(k, Sampled::Expire(*at))),
            }
        }

        fn access_meta(&self, _shard: usize, key: &[u8]) -> Option<AccessMeta> {
            self.main.get(key).copied()
        }

        fn contains(&self, _shard: usize, keyspace: Keyspace, key: &[u8]) -> bool {
            match keyspace {
                Keyspace::Main => self.main.contains_key(key),
                Keyspace::Expires => self.expires.contains_key(key),
            }
        }

        fn random_key(&self, _shard: usize, _keyspace: Keyspace) -> Option<Vec<u8>> {
            None
        }

        fn delete_sync(&mut self, _shard: usize, key: &[u8]) -> bool {
            self.expires.remove(key);
            self.main.remove(key).is_some()
        }
    }

    fn store() -> OrderedStore {
        let mut s = OrderedStore::default();
        s.main.insert(b"a".to_vec(), AccessMeta::from_lru_clock(90));
        s.main.insert(b"b".to_vec(), AccessMeta::from_lru_clock(10));
        s.main.insert(b"c".to_vec(), AccessMeta::from_lru_clock(50));
        s.expires.insert(b"b".to_vec(), 500);
        s.expires.insert(b"c".to_vec(), 200);
        // expiring key missing from the main table
        s.expires.insert(b"d".to_vec(), 100);
        s
    }

    #[test]
    fn test_populate_main() {
        let store = store();
        let est = Estimator::new(EvictionPolicy::AllkeysLru, 1);
        let mut pool = EvictionPool::new();
        let n = Sampler::new(5).populate(
            &store,
            0,
            Keyspace::Main,
            &est,
            &Now::from_secs(100),
            &mut pool,
        );
        assert_eq!(n, 3);
        let best = pool.best().unwrap();
        assert_eq!(best.key, b"b");
        assert_eq!(best.priority, 90_000);
    }

    #[test]
    fn test_populate_volatile_resolves_meta() {
        let store = store();
        let est = Estimator::new(EvictionPolicy::VolatileLru, 1);
        let mut pool = EvictionPool::new();
        let n = Sampler::new(5).populate(
            &store,
            0,
            Keyspace::Expires,
            &est,
            &Now::from_secs(100),
            &mut pool,
        );
        // "d" has no value and is skipped
        assert_eq!(n, 2);
        assert_eq!(pool.best().unwrap().key, b"b");
    }

    #[test]
    fn test_populate_ttl_uses_expire() {
        let store = store();
        let est = Estimator::new(EvictionPolicy::VolatileTtl, 1);
        let mut pool = EvictionPool::new();
        let n = Sampler::new(5).populate(
            &store,
            0,
            Keyspace::Expires,
            &est,
            &Now::from_secs(100),
            &mut pool,
        );
        assert_eq!(n, 3);
        assert_eq!(pool.best().unwrap().key, b"d");
    }

    #[test]
    fn test_populate_respects_count() {
        let store = store();
        let est = Estimator::new(EvictionPolicy::AllkeysLru, 1);
        let mut pool = EvictionPool::new();
        let n = Sampler::new(1).populate(
            &store,
            0,
            Keyspace::Main,
            &est,
            &Now::from_secs(100),
            &mut pool,
        );
        assert_eq!(n, 1);
        assert_eq!(pool.len(), 1);
    }
}
