//! Correlation store: session id to client callback URL, with TTL.
//!
//! A record is written once when the provider accepts a start-auth request and
//! consumed once when the matching callback arrives. Expired, consumed and
//! unknown records are indistinguishable: all read as `None`.

pub mod memory;
pub mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::{RedisConfig, RedisStore};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid correlation store configuration: {0}")]
    Config(String),
    #[error("correlation store unavailable: {0}")]
    Pool(#[from] deadpool_redis::PoolError),
    #[error("correlation store command failed: {0}")]
    Command(#[from] ::redis::RedisError),
    #[error("correlation store timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait CorrelationStore: Send + Sync {
    /// Store the mapping, overwriting any existing record for the key.
    async fn put(&self, session_id: &str, callback_url: &str, ttl: Duration)
    -> Result<(), StoreError>;

    /// Read a live record without consuming it.
    async fn get(&self, session_id: &str) -> Result<Option<String>, StoreError>;

    /// Read and delete a live record in one step.
    async fn take(&self, session_id: &str) -> Result<Option<String>, StoreError>;

    /// Check that the backing store answers.
    async fn ping(&self) -> Result<(), StoreError>;
}
