//! Eviction configuration.

use crate::error::{EvictError, EvictResult};
use crate::lfu::{LFU_DEFAULT_DECAY_TIME, LFU_DEFAULT_LOG_FACTOR};
use crate::policy::EvictionPolicy;
use serde::Deserialize;

/// Default samples per shard per populate.
pub const DEFAULT_SAMPLES: usize = 5;

/// Upper bound on samples per shard.
pub const MAX_SAMPLES: usize = 64;

/// Default bound on waiting for background frees, in milliseconds.
pub const DEFAULT_DEFERRED_WAIT_LIMIT_MS: u64 = 1000;

/// Configuration for an [`EvictionEngine`](crate::EvictionEngine).
///
/// Deserializable from TOML:
///
/// ```toml
/// policy = "allkeys-lfu"
/// maxmemory = "64MB"
/// samples = 10
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EvictionConfig {
    #[serde(default)]
    pub policy: EvictionPolicy,

    /// Byte budget. Zero disables eviction entirely.
    #[serde(default, deserialize_with = "deserialize_size")]
    pub maxmemory: u64,

    /// Keys sampled from each shard per populate round.
    #[serde(default = "default_samples")]
    pub samples: usize,

    #[serde(default = "default_lfu_log_factor")]
    pub lfu_log_factor: u32,

    /// Minutes per point of LFU decay. Zero disables decay.
    #[serde(default = "default_lfu_decay_time")]
    pub lfu_decay_time: u32,

    /// Hand evicted values to the background deleter.
    #[serde(default)]
    pub lazyfree_lazy_eviction: bool,

    /// Replicas leave eviction to their primary.
    #[serde(default = "default_true")]
    pub replica_ignore_maxmemory: bool,

    /// How long to wait for background frees when nothing else can be
    /// evicted. Zero means don't wait.
    #[serde(default = "default_deferred_wait_limit_ms")]
    pub deferred_wait_limit_ms: u64,

    /// Seed for LFU counter increments. Random when unset.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_samples() -> usize {
    DEFAULT_SAMPLES
}

fn default_lfu_log_factor() -> u32 {
    LFU_DEFAULT_LOG_FACTOR
}

fn default_lfu_decay_time() -> u32 {
    LFU_DEFAULT_DECAY_TIME
}

fn default_true() -> bool {
    true
}

fn default_deferred_wait_limit_ms() -> u64 {
    DEFAULT_DEFERRED_WAIT_LIMIT_MS
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            policy: EvictionPolicy::default(),
            maxmemory: 0,
            samples: DEFAULT_SAMPLES,
            lfu_log_factor: LFU_DEFAULT_LOG_FACTOR,
            lfu_decay_time: LFU_DEFAULT_DECAY_TIME,
            lazyfree_lazy_eviction: false,
            replica_ignore_maxmemory: true,
            deferred_wait_limit_ms: DEFAULT_DEFERRED_WAIT_LIMIT_MS,
            seed: None,
        }
    }
}

impl EvictionConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: EvictionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_maxmemory(mut self, bytes: u64) -> Self {
        self.maxmemory = bytes;
        self
    }

    pub fn with_samples(mut self, samples: usize) -> Self {
        self.samples = samples;
        self
    }

    pub fn with_lfu_log_factor(mut self, factor: u32) -> Self {
        self.lfu_log_factor = factor;
        self
    }

    pub fn with_lfu_decay_time(mut self, minutes: u32) -> Self {
        self.lfu_decay_time = minutes;
        self
    }

    pub fn with_lazy_eviction(mut self, enabled: bool) -> Self {
        self.lazyfree_lazy_eviction = enabled;
        self
    }

    pub fn with_replica_ignore_maxmemory(mut self, enabled: bool) -> Self {
        self.replica_ignore_maxmemory = enabled;
        self
    }

    pub fn with_deferred_wait_limit_ms(mut self, ms: u64) -> Self {
        self.deferred_wait_limit_ms = ms;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> EvictResult<()> {
        if self.samples == 0 || self.samples > MAX_SAMPLES {
            return Err(EvictError::InvalidConfig(format!(
                "samples ({}) must be between 1 and {}",
                self.samples, MAX_SAMPLES
            )));
        }
        Ok(())
    }
}

fn deserialize_size<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SizeValue {
        Number(u64),
        String(String),
    }

    match SizeValue::deserialize(deserializer)? {
        SizeValue::Number(n) => Ok(n),
        SizeValue::String(s) => parse_size(&s).map_err(D::Error::custom),
    }
}

/// Parse a size string like "64MB", "4GB", "1TB" into bytes.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| c.is_alphabetic()) {
        Some(idx) => (&s[..idx], s[idx..].to_uppercase()),
        None => (s, String::new()),
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .map_err(|_| format!("invalid number: {}", num_str))?;

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "K" | "KB" | "KIB" => 1024,
        "M" | "MB" | "MIB" => 1024 * 1024,
        "G" | "GB" | "GIB" => 1024 * 1024 * 1024,
        "T" | "TB" | "TIB" => 1024 * 1024 * 1024 * 1024,
        _ => return Err(format!("unknown size suffix: {}", suffix)),
    };

    num.checked_mul(multiplier)
        .ok_or_else(|| "size overflow".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EvictionConfig::default();
        assert_eq!(config.policy, EvictionPolicy::Noeviction);
        assert_eq!(config.maxmemory, 0);
        assert_eq!(config.samples, 5);
        assert_eq!(config.lfu_log_factor, 10);
        assert_eq!(config.lfu_decay_time, 1);
        assert!(!config.lazyfree_lazy_eviction);
        assert!(config.replica_ignore_maxmemory);
        assert_eq!(config.deferred_wait_limit_ms, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = EvictionConfig::new()
            .with_policy(EvictionPolicy::AllkeysLfu)
            .with_maxmemory(1 << 20)
            .with_samples(10)
            .with_lfu_log_factor(1)
            .with_lfu_decay_time(0)
            .with_lazy_eviction(true)
            .with_replica_ignore_maxmemory(false)
            .with_deferred_wait_limit_ms(5)
            .with_seed(7);

        assert_eq!(config.policy, EvictionPolicy::AllkeysLfu);
        assert_eq!(config.maxmemory, 1 << 20);
        assert_eq!(config.samples, 10);
        assert_eq!(config.lfu_log_factor, 1);
        assert_eq!(config.lfu_decay_time, 0);
        assert!(config.lazyfree_lazy_eviction);
        assert!(!config.replica_ignore_maxmemory);
        assert_eq!(config.deferred_wait_limit_ms, 5);
        assert_eq!(config.seed, Some(7));
    }

    #[test]
    fn test_validate_samples() {
        assert!(EvictionConfig::new().with_samples(0).validate().is_err());
        assert!(EvictionConfig::new().with_samples(64).validate().is_ok());
        assert!(matches!(
            EvictionConfig::new().with_samples(65).validate(),
            Err(EvictError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1024"), Ok(1024));
        assert_eq!(parse_size("64MB"), Ok(64 * 1024 * 1024));
        assert_eq!(parse_size("4 gb"), Ok(4 * 1024 * 1024 * 1024));
        assert_eq!(parse_size("1KiB"), Ok(1024));
        assert!(parse_size("").is_err());
        assert!(parse_size("12XB").is_err());
        assert!(parse_size("99999999999T").is_err());
    }

    #[test]
    fn test_deserialize_toml() {
        let config: EvictionConfig = toml::from_str(
            r#"
            policy = "volatile-ttl"
            maxmemory = "2MB"
            samples = 8
            lazyfree_lazy_eviction = true
            "#,
        )
        .unwrap();
        assert_eq!(config.policy, EvictionPolicy::VolatileTtl);
        assert_eq!(config.maxmemory, 2 * 1024 * 1024);
        assert_eq!(config.samples, 8);
        assert!(config.lazyfree_lazy_eviction);
        assert_eq!(config.lfu_log_factor, 10);

        let config: EvictionConfig = toml::from_str("maxmemory = 4096").unwrap();
        assert_eq!(config.maxmemory, 4096);
        assert_eq!(config.policy, EvictionPolicy::Noeviction);
    }

    #[test]
    fn test_deserialize_rejects_unknown() {
        assert!(toml::from_str::<EvictionConfig>("maxmemory_policy = \"lru\"").is_err());
        assert!(toml::from_str::<EvictionConfig>("policy = \"lru\"").is_err());
    }
}
