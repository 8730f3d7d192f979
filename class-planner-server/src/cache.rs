use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;

use class_planner_core::{Error, Result, cache::CacheBackend};

/// Redis 缓存实现
#[derive(Clone)]
pub struct RedisCache {
    connection: redis::aio::MultiplexedConnection,
    prefix: String,
}

impl RedisCache {
    /// 创建新的 Redis 缓存实例
    pub async fn new(redis_url: &str, prefix: Option<String>) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| Error::Config(format!("Failed to create Redis client: {e}")))?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| Error::Config(format!("Failed to connect to Redis: {e}")))?;

        Ok(Self {
            connection,
            prefix: prefix.unwrap_or_else(|| "class_planner".to_string()),
        })
    }

    /// 构建带前缀的键
    fn build_key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn set_raw(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let full_key = self.build_key(key);
        let mut conn = self.connection.clone();

        // SETEX 不接受 0 秒
        conn.set_ex::<_, _, ()>(&full_key, value, ttl.as_secs().max(1))
            .await
            .map_err(|e| Error::Internal(format!("Failed to set Redis key: {e}")))?;

        Ok(())
    }

    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let full_key = self.build_key(key);
        let mut conn = self.connection.clone();

        conn.get(&full_key)
            .await
            .map_err(|e| Error::Internal(format!("Failed to get Redis key: {e}")))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let full_key = self.build_key(key);
        let mut conn = self.connection.clone();

        conn.del::<_, ()>(&full_key)
            .await
            .map_err(|e| Error::Internal(format!("Failed to delete Redis key: {e}")))?;

        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let full_key = self.build_key(key);
        let mut conn = self.connection.clone();

        conn.exists(&full_key)
            .await
            .map_err(|e| Error::Internal(format!("Failed to check Redis key existence: {e}")))
    }
}
