//! Process-wide eviction metrics.

use metriken::{AtomicHistogram, Counter, metric};

#[metric(name = "evicted_keys", description = "Total keys evicted")]
pub static EVICTED_KEYS: Counter = Counter::new();

#[metric(
    name = "eviction_cycles",
    description = "Eviction cycles run while over the memory budget"
)]
pub static EVICTION_CYCLES: Counter = Counter::new();

#[metric(
    name = "eviction_blocked",
    description = "Eviction cycles that could not get back under budget"
)]
pub static EVICTION_BLOCKED: Counter = Counter::new();

#[metric(
    name = "eviction_ghosts",
    description = "Stale pool entries discarded during victim selection"
)]
pub static EVICTION_GHOSTS: Counter = Counter::new();

#[metric(
    name = "eviction_bytes_freed",
    description = "Bytes reclaimed by eviction, as measured by the allocator"
)]
pub static EVICTION_BYTES_FREED: Counter = Counter::new();

#[metric(
    name = "eviction_cycle_latency",
    description = "Duration of an eviction cycle (nanoseconds)"
)]
pub static EVICTION_CYCLE_LATENCY: AtomicHistogram = AtomicHistogram::new(7, 64);

#[metric(
    name = "eviction_delete_latency",
    description = "Duration of a single eviction delete (nanoseconds)"
)]
pub static EVICTION_DELETE_LATENCY: AtomicHistogram = AtomicHistogram::new(7, 64);
