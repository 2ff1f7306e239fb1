//! Benchmark metrics.

use metriken::{AtomicHistogram, Counter, metric};

#[metric(name = "get_count", description = "Total GET operations")]
pub static GET_COUNT: Counter = Counter::new();

#[metric(name = "set_count", description = "Total SET operations")]
pub static SET_COUNT: Counter = Counter::new();

#[metric(
    name = "set_blocked",
    description = "SETs rejected because memory could not be freed"
)]
pub static SET_BLOCKED: Counter = Counter::new();

#[metric(name = "cache_hits", description = "Total cache hits")]
pub static CACHE_HITS: Counter = Counter::new();

#[metric(name = "cache_misses", description = "Total cache misses")]
pub static CACHE_MISSES: Counter = Counter::new();

#[metric(
    name = "get_latency",
    description = "GET latency histogram (nanoseconds)"
)]
pub static GET_LATENCY: AtomicHistogram = AtomicHistogram::new(7, 64);

#[metric(
    name = "set_latency",
    description = "SET latency histogram (nanoseconds)"
)]
pub static SET_LATENCY: AtomicHistogram = AtomicHistogram::new(7, 64);

#[metric(
    name = "evict_latency",
    description = "Budget check and eviction before a SET (nanoseconds)"
)]
pub static EVICT_LATENCY: AtomicHistogram = AtomicHistogram::new(7, 64);
