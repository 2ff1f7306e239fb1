//! Dense hash table with O(1) uniform random access.
//!
//! Entries live in a contiguous vector; an `ahash` map indexes them by key.
//! Removal swaps the last entry into the hole, so the vector stays dense and
//! a random index is a uniform random entry.

use ahash::AHashMap;
use rand::Rng;

#[derive(Debug)]
pub struct Table<V> {
    index: AHashMap<Box<[u8]>, usize>,
    entries: Vec<(Box<[u8]>, V)>,
}

impl<V> Default for Table<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Table<V> {
    pub fn new() -> Self {
        Self {
            index: AHashMap::new(),
            entries: Vec::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn contains(&self, key: &[u8]) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &[u8]) -> Option<&V> {
        let idx = *self.index.get(key)?;
        Some(&self.entries[idx].1)
    }

    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut V> {
        let idx = *self.index.get(key)?;
        Some(&mut self.entries[idx].1)
    }

    /// Insert or replace, returning the previous value.
    pub fn insert(&mut self, key: &[u8], value: V) -> Option<V> {
        if let Some(&idx) = self.index.get(key) {
            return Some(std::mem::replace(&mut self.entries[idx].1, value));
        }
        let key: Box<[u8]> = key.into();
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, value));
        None
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<V> {
        let idx = self.index.remove(key)?;
        let (_, value) = self.entries.swap_remove(idx);
        if let Some((moved, _)) = self.entries.get(idx)
            && let Some(slot) = self.index.get_mut(moved)
        {
            *slot = idx;
        }
        Some(value)
    }

    /// A uniformly random entry.
    pub fn random<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<(&[u8], &V)> {
        if self.entries.is_empty() {
            return None;
        }
        let (key, value) = &self.entries[rng.random_range(0..self.entries.len())];
        Some((key, value))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &V)> {
        self.entries.iter().map(|(k, v)| (&**k, v))
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.entries.clear();
    }
}
