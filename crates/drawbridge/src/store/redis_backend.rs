//! Redis-backed address tables.
//!
//! Each table column is a Redis set at `moat:{table}:{column}`.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use moat_common::constants::redis_keys::{TABLE_PREFIX, table_key};

use super::backend::{AddressBackend, StoreError};

pub struct RedisBackend {
    /// Redis connection manager (auto-reconnecting)
    redis: ConnectionManager,
}

impl RedisBackend {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let redis = ConnectionManager::new(client).await?;
        Ok(Self { redis })
    }
}

#[async_trait]
impl AddressBackend for RedisBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn initialize(&self) -> Result<(), StoreError> {
        let mut conn = self.redis.clone();
        let pong: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;
        match pong {
            Ok(_) => Ok(()),
            Err(e) => Err(StoreError::Unavailable(e.to_string())),
        }
    }

    async fn get_list_from_table(&self, table: &str, column: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.redis.clone();
        let entries: Vec<String> = conn.smembers(table_key(table, column)).await?;
        Ok(entries)
    }

    async fn add_list_to_table(&self, table: &str, column: &str, list: Vec<String>) -> Result<(), StoreError> {
        if list.is_empty() {
            return Ok(());
        }
        let mut conn = self.redis.clone();
        conn.sadd::<_, _, ()>(table_key(table, column), list).await?;
        Ok(())
    }

    async fn remove_from_table(&self, table: &str, column: &str, list: Vec<String>) -> Result<(), StoreError> {
        if list.is_empty() {
            return Ok(());
        }
        let mut conn = self.redis.clone();
        conn.srem::<_, _, ()>(table_key(table, column), list).await?;
        Ok(())
    }

    async fn clear(&self, table: &str) -> Result<(), StoreError> {
        let mut conn = self.redis.clone();
        let keys: Vec<String> = conn.keys(format!("{TABLE_PREFIX}{table}:*")).await?;
        if !keys.is_empty() {
            conn.del::<_, ()>(keys).await?;
        }
        Ok(())
    }

    async fn dispose(&self) -> Result<(), StoreError> {
        // the connection manager closes with its last clone
        tracing::debug!("Redis backend disposed");
        Ok(())
    }
}
