//! Memory accounting.
//!
//! Usage is read from the allocator through [`Host`]. Buffers that grow with
//! replication lag rather than with the dataset (replica output buffers and
//! append-log rewrite buffers) are reported separately and excluded from the
//! figure compared against the budget, since evicting keys cannot shrink them.

use crate::error::{EvictError, EvictResult};

/// The allocator and runtime surrounding a store.
///
/// Only [`used_bytes`](Host::used_bytes) is required. The remaining hooks
/// default to a standalone process with no replicas.
pub trait Host {
    /// Bytes currently allocated by the process.
    fn used_bytes(&self) -> EvictResult<u64>;

    /// Bytes held by replica output and append-log buffers.
    fn unaccounted_bytes(&self) -> u64 {
        0
    }

    fn has_replicas(&self) -> bool {
        false
    }

    /// Push pending replica output so long eviction runs don't stall them.
    fn flush_replica_output(&mut self) {}

    /// Client writes are paused; evicting now would be observable.
    fn clients_paused(&self) -> bool {
        false
    }

    fn is_replica(&self) -> bool {
        false
    }

    /// The dataset is loading or a script has timed out.
    fn eviction_suspended(&self) -> bool {
        false
    }

    /// Called after a key is evicted, to propagate the deletion and notify
    /// keyspace subscribers.
    fn evicted(&mut self, _shard: usize, _key: &[u8]) {}
}

/// Host for a standalone process, reading usage from the allocator.
///
/// With the `jemalloc` feature this reads jemalloc's `stats.allocated`.
/// Otherwise it falls back to resident set size on Linux.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHost;

impl SystemHost {
    #[cfg(feature = "jemalloc")]
    fn query_allocator_memory() -> Option<u64> {
        use tikv_jemalloc_ctl::{epoch, stats};
        // Advance epoch to refresh cached stats
        epoch::advance().ok()?;
        stats::allocated::read().ok().map(|b| b as u64)
    }

    #[cfg(not(feature = "jemalloc"))]
    fn query_allocator_memory() -> Option<u64> {
        #[cfg(target_os = "linux")]
        {
            Self::read_proc_statm_rss()
        }
        #[cfg(not(target_os = "linux"))]
        {
            None
        }
    }

    #[cfg(all(target_os = "linux", not(feature = "jemalloc")))]
    fn read_proc_statm_rss() -> Option<u64> {
        let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
        let rss_pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
        Some(rss_pages * 4096)
    }
}

impl Host for SystemHost {
    fn used_bytes(&self) -> EvictResult<u64> {
        Self::query_allocator_memory().ok_or_else(|| {
            EvictError::MemoryUnavailable("allocator statistics are not available".into())
        })
    }
}

/// Amount by which usage exceeds the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overage {
    /// Allocator-reported usage.
    pub total: u64,
    /// Usage net of unaccounted buffers.
    pub logical: u64,
    /// Bytes that must be reclaimed to get back under budget.
    pub to_free: u64,
}

/// Point-in-time memory report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryState {
    pub total_used: u64,
    pub logical_used: u64,
    pub bytes_to_free: u64,
    /// Logical usage divided by the budget; 0 when unbounded.
    pub usage_ratio: f32,
    pub over_budget: bool,
}

/// Summary exposed for reporting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryPressure {
    pub usage_ratio: f32,
    pub over_budget: bool,
}

impl From<MemoryState> for MemoryPressure {
    fn from(state: MemoryState) -> Self {
        Self {
            usage_ratio: state.usage_ratio,
            over_budget: state.over_budget,
        }
    }
}

/// Compares allocator usage against a byte budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryAccountant {
    budget: u64,
}

impl MemoryAccountant {
    /// A budget of zero means unbounded.
    pub fn new(budget: u64) -> Self {
        Self { budget }
    }

    pub fn budget(&self) -> u64 {
        self.budget
    }

    pub fn is_bounded(&self) -> bool {
        self.budget > 0
    }

    /// How far over budget the host is, or `None` if it is within budget.
    ///
    /// Overhead is only queried when the raw figure is over budget.
    pub fn overage<H: Host + ?Sized>(&self, host: &H) -> EvictResult<Option<Overage>> {
        if self.budget == 0 {
            return Ok(None);
        }

        let total = host.used_bytes()?;
        if total <= self.budget {
            return Ok(None);
        }

        let logical = total.saturating_sub(host.unaccounted_bytes());
        if logical <= self.budget {
            return Ok(None);
        }

        Ok(Some(Overage {
            total,
            logical,
            to_free: logical - self.budget,
        }))
    }

    /// Full report. Has no side effects.
    ///
    /// Unlike [`overage`](Self::overage), overhead is always subtracted so the
    /// ratio tracks logical usage on both sides of the budget.
    pub fn state<H: Host + ?Sized>(&self, host: &H) -> EvictResult<MemoryState> {
        let total = host.used_bytes()?;

        if self.budget == 0 {
            return Ok(MemoryState {
                total_used: total,
                logical_used: total,
                bytes_to_free: 0,
                usage_ratio: 0.0,
                over_budget: false,
            });
        }

        let logical = total.saturating_sub(host.unaccounted_bytes());
        let over_budget = logical > self.budget;

        Ok(MemoryState {
            total_used: total,
            logical_used: logical,
            bytes_to_free: if over_budget { logical - self.budget } else { 0 },
            usage_ratio: logical as f32 / self.budget as f32,
            over_budget,
        })
    }
}
