//! Redis adapter for the TTL cache port, pooled via `bb8`.

use std::time::Duration;

use async_trait::async_trait;
use bb8_redis::RedisConnectionManager;
use bb8_redis::bb8::Pool;
use bb8_redis::redis::AsyncCommands;

use super::TtlCache;
use crate::error::WardenError;

/// Redis-backed TTL cache.
#[derive(Debug, Clone)]
pub struct RedisTtlCache {
    pool: Pool<RedisConnectionManager>,
}

impl RedisTtlCache {
    /// Connects to the Redis instance at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`WardenError::Cache`] when the URL is invalid or the pool
    /// cannot be built.
    pub async fn connect(url: &str) -> Result<Self, WardenError> {
        let manager =
            RedisConnectionManager::new(url).map_err(|e| WardenError::Cache(e.to_string()))?;
        let pool = Pool::builder()
            .build(manager)
            .await
            .map_err(|e| WardenError::Cache(e.to_string()))?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl TtlCache for RedisTtlCache {
    async fn get(&self, key: &str) -> Result<Option<String>, WardenError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| WardenError::Cache(e.to_string()))?;
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(|e| WardenError::Cache(e.to_string()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), WardenError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| WardenError::Cache(e.to_string()))?;
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
            .await
            .map_err(|e| WardenError::Cache(e.to_string()))
    }
}
