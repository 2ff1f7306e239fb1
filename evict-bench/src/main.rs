//! Eviction benchmark: drives the evict engine over the reference keyspace
//! with a hot/cold get-then-set workload.

#[cfg(feature = "jemalloc")]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

mod config;
mod logging;
mod metrics;
mod worker;

use crate::config::{Config, MemorySource};

use clap::Parser;
use evict::{EvictionEngine, SystemHost};
use keyspace::{KeyspaceStore, TrackedHost};
use metriken::AtomicHistogram;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "evict-bench")]
#[command(about = "Eviction engine benchmark")]
struct Args {
    /// Path to configuration file
    #[arg(required_unless_present = "print_config")]
    config: Option<PathBuf>,

    /// Print an example configuration and exit
    #[arg(long)]
    print_config: bool,
}

fn main() {
    let args = Args::parse();

    if args.print_config {
        print!("{}", config::EXAMPLE_CONFIG);
        return;
    }

    let Some(path) = args.config else {
        eprintln!("Missing configuration file");
        std::process::exit(1);
    };

    let config = match Config::load(&path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            std::process::exit(1);
        }
    };

    logging::init(&config.logging);

    if let Err(e) = run(config) {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        policy = %config.eviction.policy,
        maxmemory = config.eviction.maxmemory,
        samples = config.eviction.samples,
        lazy = config.eviction.lazyfree_lazy_eviction,
        memory = %config.general.memory,
        shards = config.general.shards,
        operations = config.general.operations,
        keys = config.workload.keys,
        "starting"
    );

    let mut store = KeyspaceStore::builder()
        .shards(config.general.shards)
        .eviction(&config.eviction)
        .build()?;
    let mut engine = EvictionEngine::new(config.eviction.clone())?;

    let summary = match config.general.memory {
        MemorySource::Keyspace => {
            let mut host = TrackedHost::new(store.memory_counter());
            worker::run(&config, &mut store, &mut engine, &mut host)?
        }
        MemorySource::Allocator => {
            let mut host = SystemHost;
            worker::run(&config, &mut store, &mut engine, &mut host)?
        }
    };

    summary.log();

    let stats = engine.stats();
    info!(
        cycles = stats.cycles,
        blocked = stats.blocked,
        ghosts = stats.ghosts,
        bytes_freed = stats.bytes_freed,
        "eviction"
    );

    log_latency("get", &metrics::GET_LATENCY);
    log_latency("set", &metrics::SET_LATENCY);
    log_latency("evict", &metrics::EVICT_LATENCY);
    log_latency("cycle", &evict::metrics::EVICTION_CYCLE_LATENCY);

    Ok(())
}

fn log_latency(label: &str, hist: &AtomicHistogram) {
    let Some(snapshot) = hist.load() else {
        return;
    };
    let Ok(Some(results)) = snapshot.percentiles(&[50.0, 90.0, 99.0, 99.9, 100.0]) else {
        return;
    };
    let us: Vec<f64> = results
        .iter()
        .map(|(_, bucket)| bucket.end() as f64 / 1000.0)
        .collect();
    if let [p50, p90, p99, p999, max] = us[..] {
        info!(op = label, p50, p90, p99, p999, max, "latency (us)");
    }
}
