//! Byte accounting shared between the store and its background deleter.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Fixed per-entry cost on top of key and value bytes: table slot, index
/// entry and value header.
pub const ENTRY_OVERHEAD: u64 = 48;

/// Extra cost of a key carrying an expiration.
pub const EXPIRE_OVERHEAD: u64 = 32;

/// Bytes charged for one entry.
#[inline]
pub fn entry_size(key: &[u8], value: &[u8], volatile: bool) -> u64 {
    let size = key.len() as u64 + value.len() as u64 + ENTRY_OVERHEAD;
    if volatile { size + EXPIRE_OVERHEAD } else { size }
}

/// Shared counter of bytes held by the keyspace.
///
/// Clones observe the same counter.
#[derive(Debug, Clone, Default)]
pub struct MemoryCounter {
    bytes: Arc<AtomicU64>,
}

impl MemoryCounter {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add(&self, bytes: u64) {
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Saturates at zero.
    #[inline]
    pub fn sub(&self, bytes: u64) {
        let _ = self
            .bytes
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |cur| {
                Some(cur.saturating_sub(bytes))
            });
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}
