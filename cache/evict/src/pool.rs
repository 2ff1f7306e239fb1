//! Eviction candidate pool.
//!
//! A fixed array of [`EVPOOL_SIZE`] candidates sorted by ascending priority.
//! The best candidate to evict is always the last populated slot. Populated
//! slots form a prefix; empty slots are the suffix.
//!
//! ```text
//!   index:    0     1     2          len-1   len        15
//!           +-----+-----+-----+ ... +-----+ +-----+ ... +-----+
//!           | 12  | 40  | 40  |     | 900 | |     |     |     |
//!           +-----+-----+-----+ ... +-----+ +-----+ ... +-----+
//!            worst                   best     empty
//! ```
//!
//! Each slot owns a scratch buffer of [`EVPOOL_CACHED_KEY_LEN`] bytes that
//! short keys are copied into. Buffers travel with their slot when entries
//! shift, so steady-state insertion does not allocate. Longer keys get an
//! owned allocation.
//!
//! The pool persists across eviction cycles and may hold entries whose key
//! has since been deleted or changed. Callers must re-validate an entry
//! before acting on it; [`EvictionPool::select`] does so.

/// Number of candidates kept.
pub const EVPOOL_SIZE: usize = 16;

/// Keys up to this length are stored in the slot's scratch buffer.
pub const EVPOOL_CACHED_KEY_LEN: usize = 255;

#[derive(Debug)]
enum SlotKey {
    Empty,
    Cached(u8),
    Owned(Box<[u8]>),
}

#[derive(Debug)]
struct Slot {
    priority: u64,
    shard: usize,
    key: SlotKey,
    cached: Box<[u8; EVPOOL_CACHED_KEY_LEN]>,
}

impl Slot {
    fn new() -> Self {
        Self {
            priority: 0,
            shard: 0,
            key: SlotKey::Empty,
            cached: Box::new([0; EVPOOL_CACHED_KEY_LEN]),
        }
    }

    fn fill(&mut self, priority: u64, shard: usize, key: &[u8]) {
        self.priority = priority;
        self.shard = shard;
        self.key = if key.len() <= EVPOOL_CACHED_KEY_LEN {
            self.cached[..key.len()].copy_from_slice(key);
            SlotKey::Cached(key.len() as u8)
        } else {
            SlotKey::Owned(key.into())
        };
    }

    fn clear(&mut self) {
        self.priority = 0;
        self.shard = 0;
        self.key = SlotKey::Empty;
    }

    fn key(&self) -> Option<&[u8]> {
        match &self.key {
            SlotKey::Empty => None,
            SlotKey::Cached(len) => Some(&self.cached[..*len as usize]),
            SlotKey::Owned(key) => Some(key),
        }
    }

    fn is_cached(&self) -> bool {
        matches!(self.key, SlotKey::Cached(_))
    }
}

/// A populated pool entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate<'a> {
    pub priority: u64,
    pub shard: usize,
    pub key: &'a [u8],
}

/// Result of scanning the pool for a victim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    /// Shard of the chosen victim. The key is written to the caller's buffer.
    pub victim: Option<usize>,
    /// Stale entries discarded while scanning.
    pub ghosts: usize,
}

/// Fixed-capacity, ascending-priority candidate buffer.
#[derive(Debug)]
pub struct EvictionPool {
    slots: [Slot; EVPOOL_SIZE],
    len: usize,
}

impl Default for EvictionPool {
    fn default() -> Self {
        Self::new()
    }
}

impl EvictionPool {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| Slot::new()),
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == EVPOOL_SIZE
    }

    /// Lowest priority present, if any.
    pub fn min_priority(&self) -> Option<u64> {
        self.iter().next().map(|c| c.priority)
    }

    /// Highest priority candidate.
    pub fn best(&self) -> Option<Candidate<'_>> {
        self.iter().next_back()
    }

    /// Populated entries in ascending priority order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = Candidate<'_>> + '_ {
        self.slots[..self.len].iter().filter_map(|slot| {
            slot.key().map(|key| Candidate {
                priority: slot.priority,
                shard: slot.shard,
                key,
            })
        })
    }

    /// Offer a candidate.
    ///
    /// The candidate is placed after any entries of equal priority. When the
    /// pool is full the lowest entry is dropped to make room, unless the
    /// candidate does not beat it, in which case nothing changes and `false`
    /// is returned.
    pub fn insert(&mut self, priority: u64, shard: usize, key: &[u8]) -> bool {
        let k = self.slots[..self.len].partition_point(|s| s.priority <= priority);

        let idx = if self.len == EVPOOL_SIZE {
            if priority <= self.slots[0].priority {
                return false;
            }
            // k >= 1 here. Slot 0 moves up to k - 1 and is overwritten.
            self.slots[..k].rotate_left(1);
            k - 1
        } else {
            // The empty slot at `len` moves down to k.
            self.slots[k..=self.len].rotate_right(1);
            self.len += 1;
            k
        };

        self.slots[idx].fill(priority, shard, key);
        true
    }

    /// Scan from the best candidate down, discarding entries for which
    /// `is_live` returns false, until a live one is found.
    ///
    /// The chosen entry is removed from the pool and its key copied into
    /// `victim`. Every scanned entry is removed, live or not.
    pub fn select<F>(&mut self, mut is_live: F, victim: &mut Vec<u8>) -> Selection
    where
        F: FnMut(usize, &[u8]) -> bool,
    {
        let mut selection = Selection::default();

        while self.len > 0 {
            let top = &mut self.slots[self.len - 1];
            self.len -= 1;

            let live = match top.key() {
                Some(key) if is_live(top.shard, key) => {
                    victim.clear();
                    victim.extend_from_slice(key);
                    true
                }
                _ => false,
            };
            let shard = top.shard;
            top.clear();

            if live {
                selection.victim = Some(shard);
                break;
            }
            selection.ghosts += 1;
        }

        selection
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots[..self.len] {
            slot.clear();
        }
        self.len = 0;
    }

    /// Number of populated slots holding a key in their scratch buffer.
    pub fn cached_keys(&self) -> usize {
        self.slots[..self.len].iter().filter(|s| s.is_cached()).count()
    }
}
