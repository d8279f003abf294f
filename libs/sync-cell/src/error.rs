use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Storage operation failed: {0}")]
    Storage(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Redis connection error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Redis pool error: {0}")]
    Pool(String),

    #[error("Broadcast channel '{0}' is unavailable")]
    ChannelUnavailable(String),
}
