use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use thiserror::Error;
use tokio::time::timeout;

/// TTL answer for a key that does not exist.
pub const TTL_KEY_MISSING: i64 = -2;
/// TTL answer for a key that exists but carries no expiry.
pub const TTL_NO_EXPIRY: i64 = -1;

// Liveness decisions are made on every probe request, so no store call is
// allowed to block past this deadline.
const REDIS_TIMEOUT_MILLISECS: u64 = 1000;

#[derive(Error, Debug, Clone)]
pub enum CustomRedisError {
    #[error("Not found in redis")]
    NotFound,
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Timeout error")]
    Timeout,
    #[error(transparent)]
    Redis(#[from] Arc<redis::RedisError>),
}

impl From<redis::RedisError> for CustomRedisError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            CustomRedisError::Timeout
        } else {
            CustomRedisError::Redis(Arc::new(err))
        }
    }
}

impl From<tokio::time::error::Elapsed> for CustomRedisError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        CustomRedisError::Timeout
    }
}

/// The slice of the key-value store this crate depends on: expiring writes,
/// deletes, TTL inspection and a cursor-paged key scan.
#[async_trait]
pub trait Client {
    async fn setex(&self, k: String, v: String, seconds: u64) -> Result<(), CustomRedisError>;
    async fn get(&self, k: String) -> Result<String, CustomRedisError>;
    /// Deleting a key that does not exist is a no-op, not an error.
    async fn del(&self, k: String) -> Result<(), CustomRedisError>;
    /// Remaining TTL in seconds, or one of the `TTL_*` sentinels.
    async fn ttl(&self, k: String) -> Result<i64, CustomRedisError>;
    /// One page of a SCAN. The returned cursor is 0 once the scan has wrapped
    /// around; a single page may be a partial result.
    async fn scan(
        &self,
        cursor: u64,
        pattern: String,
        count: usize,
    ) -> Result<(u64, Vec<String>), CustomRedisError>;
}

pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub fn new(addr: String) -> Result<RedisClient, CustomRedisError> {
        let client = redis::Client::open(addr)?;

        Ok(RedisClient { client })
    }
}

#[async_trait]
impl Client for RedisClient {
    async fn setex(&self, k: String, v: String, seconds: u64) -> Result<(), CustomRedisError> {
        let mut conn = self.client.get_async_connection().await?;

        let results = conn.set_ex::<_, _, ()>(k, v, seconds as usize);
        timeout(Duration::from_millis(REDIS_TIMEOUT_MILLISECS), results).await??;

        Ok(())
    }

    async fn get(&self, k: String) -> Result<String, CustomRedisError> {
        let mut conn = self.client.get_async_connection().await?;

        let results = conn.get::<_, Option<String>>(k);
        let value = timeout(Duration::from_millis(REDIS_TIMEOUT_MILLISECS), results).await??;

        value.ok_or(CustomRedisError::NotFound)
    }

    async fn del(&self, k: String) -> Result<(), CustomRedisError> {
        let mut conn = self.client.get_async_connection().await?;

        let results = conn.del::<_, ()>(k);
        timeout(Duration::from_millis(REDIS_TIMEOUT_MILLISECS), results).await??;

        Ok(())
    }

    async fn ttl(&self, k: String) -> Result<i64, CustomRedisError> {
        let mut conn = self.client.get_async_connection().await?;

        let results = conn.ttl::<_, i64>(k);
        let ttl = timeout(Duration::from_millis(REDIS_TIMEOUT_MILLISECS), results).await??;

        Ok(ttl)
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: String,
        count: usize,
    ) -> Result<(u64, Vec<String>), CustomRedisError> {
        let mut conn = self.client.get_async_connection().await?;

        let mut cmd = redis::cmd("SCAN");
        cmd.arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count);

        let results = cmd.query_async::<_, (u64, Vec<String>)>(&mut conn);
        let page = timeout(Duration::from_millis(REDIS_TIMEOUT_MILLISECS), results).await??;

        Ok(page)
    }
}
