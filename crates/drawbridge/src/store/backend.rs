//! Durable storage contract for address tables.
//!
//! A table holds a set of serialized entries per column. The engine reads
//! each table once at startup and afterwards only writes.

use std::collections::HashSet;

use async_trait::async_trait;
use dashmap::DashMap;

use moat_common::constants::redis_keys::table_key;

/// Storage backend errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait AddressBackend: Send + Sync + 'static {
    /// Human-readable backend name for logs
    fn name(&self) -> &'static str;

    async fn initialize(&self) -> Result<(), StoreError>;

    async fn get_list_from_table(&self, table: &str, column: &str) -> Result<Vec<String>, StoreError>;

    async fn add_list_to_table(&self, table: &str, column: &str, list: Vec<String>) -> Result<(), StoreError>;

    async fn remove_from_table(&self, table: &str, column: &str, list: Vec<String>) -> Result<(), StoreError>;

    /// Drops every column of `table`
    async fn clear(&self, table: &str) -> Result<(), StoreError>;

    async fn dispose(&self) -> Result<(), StoreError>;
}

/// Process-local backend, used when no durable storage is configured
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: DashMap<String, HashSet<String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AddressBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn initialize(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get_list_from_table(&self, table: &str, column: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .tables
            .get(&table_key(table, column))
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn add_list_to_table(&self, table: &str, column: &str, list: Vec<String>) -> Result<(), StoreError> {
        self.tables
            .entry(table_key(table, column))
            .or_default()
            .extend(list);
        Ok(())
    }

    async fn remove_from_table(&self, table: &str, column: &str, list: Vec<String>) -> Result<(), StoreError> {
        if let Some(mut entries) = self.tables.get_mut(&table_key(table, column)) {
            for entry in &list {
                entries.remove(entry);
            }
        }
        Ok(())
    }

    async fn clear(&self, table: &str) -> Result<(), StoreError> {
        let prefix = table_key(table, "");
        self.tables.retain(|key, _| !key.starts_with(&prefix));
        Ok(())
    }

    async fn dispose(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend_tables() {
        let backend = MemoryBackend::new();
        backend.initialize().await.unwrap();
        backend
            .add_list_to_table("verified", "entries", vec!["1.2.3.4".into(), "5.6.7.8".into()])
            .await
            .unwrap();
        backend
            .add_list_to_table("blacklist", "entries", vec!["9.9.9.9".into()])
            .await
            .unwrap();

        let mut verified = backend.get_list_from_table("verified", "entries").await.unwrap();
        verified.sort();
        assert_eq!(verified, vec!["1.2.3.4", "5.6.7.8"]);

        backend
            .remove_from_table("verified", "entries", vec!["1.2.3.4".into()])
            .await
            .unwrap();
        assert_eq!(
            backend.get_list_from_table("verified", "entries").await.unwrap(),
            vec!["5.6.7.8"]
        );

        backend.clear("verified").await.unwrap();
        assert!(backend.get_list_from_table("verified", "entries").await.unwrap().is_empty());
        assert_eq!(backend.get_list_from_table("blacklist", "entries").await.unwrap().len(), 1);
    }
}
