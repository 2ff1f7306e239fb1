//! Configuration for the eviction benchmark.

use evict::EvictionConfig;
use serde::Deserialize;
use std::path::Path;

/// Annotated example, printed by `--print-config`.
pub const EXAMPLE_CONFIG: &str = include_str!("../config/example.toml");

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub eviction: EvictionConfig,
    #[serde(default)]
    pub workload: WorkloadConfig,
}

/// General benchmark settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneralConfig {
    /// Operations to run.
    #[serde(default = "GeneralConfig::default_operations")]
    pub operations: u64,
    /// Keyspace shards.
    #[serde(default = "GeneralConfig::default_shards")]
    pub shards: usize,
    /// Workload seed. Also seeds the engine unless `[eviction]` sets one.
    #[serde(default = "GeneralConfig::default_seed")]
    pub seed: u64,
    /// Where memory usage is read from.
    #[serde(default)]
    pub memory: MemorySource,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            operations: Self::default_operations(),
            shards: Self::default_shards(),
            seed: Self::default_seed(),
            memory: MemorySource::default(),
        }
    }
}

impl GeneralConfig {
    fn default_operations() -> u64 {
        1_000_000
    }

    fn default_shards() -> usize {
        16
    }

    fn default_seed() -> u64 {
        42
    }
}

/// Source of the memory figure compared against `maxmemory`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemorySource {
    /// Bytes charged by the keyspace. Deterministic.
    #[default]
    Keyspace,
    /// Whole-process usage from the allocator.
    Allocator,
}

impl std::fmt::Display for MemorySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemorySource::Keyspace => write!(f, "keyspace"),
            MemorySource::Allocator => write!(f, "allocator"),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level filter, e.g. "info" or "evict=debug".
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default = "LoggingConfig::default_true")]
    pub timestamps: bool,
    /// Include the event target (module path).
    #[serde(default)]
    pub target: bool,
    #[serde(default)]
    pub thread_names: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            format: LogFormat::default(),
            timestamps: true,
            target: false,
            thread_names: false,
        }
    }
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }

    fn default_true() -> bool {
        true
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// Workload shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkloadConfig {
    /// Distinct keys.
    #[serde(default = "WorkloadConfig::default_keys")]
    pub keys: usize,
    #[serde(default = "WorkloadConfig::default_key_length")]
    pub key_length: usize,
    #[serde(default = "WorkloadConfig::default_value_length")]
    pub value_length: usize,
    /// Percent of the keyspace that is hot.
    #[serde(default = "WorkloadConfig::default_hot_percent")]
    pub hot_percent: u8,
    /// Percent of operations that target the hot set.
    #[serde(default = "WorkloadConfig::default_hot_weight")]
    pub hot_weight: u8,
    /// Percent of writes that carry a TTL.
    #[serde(default)]
    pub volatile_percent: u8,
    /// TTL in seconds for volatile writes.
    #[serde(default = "WorkloadConfig::default_ttl")]
    pub ttl: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            keys: Self::default_keys(),
            key_length: Self::default_key_length(),
            value_length: Self::default_value_length(),
            hot_percent: Self::default_hot_percent(),
            hot_weight: Self::default_hot_weight(),
            volatile_percent: 0,
            ttl: Self::default_ttl(),
        }
    }
}

impl WorkloadConfig {
    fn default_keys() -> usize {
        100_000
    }

    fn default_key_length() -> usize {
        16
    }

    fn default_value_length() -> usize {
        128
    }

    fn default_hot_percent() -> u8 {
        10
    }

    fn default_hot_weight() -> u8 {
        90
    }

    fn default_ttl() -> u64 {
        3600
    }

    /// Number of keys in the hot set, at least one.
    pub fn hot_keys(&self) -> usize {
        (self.keys * self.hot_percent as usize / 100).max(1)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration text.
    pub fn parse(contents: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config: Config = toml::from_str(contents)?;
        if config.eviction.seed.is_none() {
            config.eviction.seed = Some(config.general.seed);
        }
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.eviction.validate()?;

        if self.general.shards == 0 {
            return Err("shards must be at least 1".into());
        }

        let workload = &self.workload;
        if workload.keys == 0 {
            return Err("keys must be at least 1".into());
        }
        if workload.key_length == 0 {
            return Err("key_length must be at least 1".into());
        }
        // keys are hex encoded into key_length bytes
        if workload.key_length < 16 && workload.keys as u64 > 16u64.pow(workload.key_length as u32)
        {
            return Err(format!(
                "key_length ({}) too short for {} distinct keys",
                workload.key_length, workload.keys
            )
            .into());
        }

        for (name, value) in [
            ("hot_percent", workload.hot_percent),
            ("hot_weight", workload.hot_weight),
            ("volatile_percent", workload.volatile_percent),
        ] {
            if value > 100 {
                return Err(format!("{name} ({value}) must be at most 100").into());
            }
        }

        if workload.volatile_percent > 0 && workload.ttl == 0 {
            return Err("ttl must be at least 1 second when volatile_percent is set".into());
        }

        Ok(())
    }
}
