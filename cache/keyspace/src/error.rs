//! Keyspace errors.

#[derive(Debug, thiserror::Error)]
pub enum KeyspaceError {
    #[error("shard {shard} out of range (have {shards})")]
    ShardOutOfRange { shard: usize, shards: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to start lazyfree worker: {0}")]
    LazyFree(#[from] std::io::Error),
}

pub type KeyspaceResult<T> = Result<T, KeyspaceError>;
