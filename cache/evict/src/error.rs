//! Error types for eviction operations.
//!
//! Running out of evictable keys is not an error: it is reported through
//! [`Outcome::Blocked`](crate::Outcome::Blocked). Errors are reserved for
//! conditions the engine cannot reason around.

/// Errors that can occur while evaluating or relieving memory pressure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvictError {
    /// The allocator or runtime could not report memory usage.
    ///
    /// The engine has no fallback for unknown usage, so this propagates
    /// as a hard failure.
    #[error("memory usage unavailable: {0}")]
    MemoryUnavailable(String),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for eviction operations.
pub type EvictResult<T> = Result<T, EvictError>;
