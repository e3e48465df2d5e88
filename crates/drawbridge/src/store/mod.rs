//! Verified and blacklisted address stores.
//!
//! The in-memory map is the source of truth. Mutations apply to it
//! synchronously and are mirrored to the durable backend by a single writer
//! task; backend failures are logged and never surface to callers.

mod backend;
mod redis_backend;

pub use backend::{AddressBackend, MemoryBackend, StoreError};
pub use redis_backend::RedisBackend;

use std::collections::HashSet;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use moat_common::AddressRecord;
use moat_common::constants::STORE_WRITE_BUFFER;
use moat_common::constants::tables::ENTRIES;

/// Pending durable write
#[derive(Debug, Clone, PartialEq, Eq)]
enum WriteOp {
    Add(Vec<String>),
    Remove(Vec<String>),
    Clear,
}

/// Address → identities that passed verification from it.
///
/// Blacklist entries carry no identity; their set stays empty.
pub struct AddressStore {
    table: &'static str,
    entries: DashMap<IpAddr, HashSet<Uuid>>,
    writes: mpsc::Sender<WriteOp>,
}

/// Drains [`AddressStore`] writes into the backend
pub struct StoreWriter {
    table: &'static str,
    backend: Arc<dyn AddressBackend>,
    writes: mpsc::Receiver<WriteOp>,
}

impl AddressStore {
    pub fn new(table: &'static str, backend: Arc<dyn AddressBackend>) -> (Self, StoreWriter) {
        Self::with_buffer(table, backend, STORE_WRITE_BUFFER)
    }

    /// Store whose writer holds at most `buffer` pending writes
    pub fn with_buffer(table: &'static str, backend: Arc<dyn AddressBackend>, buffer: usize) -> (Self, StoreWriter) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let store = Self {
            table,
            entries: DashMap::new(),
            writes: tx,
        };
        let writer = StoreWriter {
            table,
            backend,
            writes: rx,
        };
        (store, writer)
    }

    /// Reads the durable table into memory; called once at startup
    pub async fn load(&self, backend: &dyn AddressBackend) -> Result<usize, StoreError> {
        let list = backend.get_list_from_table(self.table, ENTRIES).await?;
        let mut loaded = 0;
        for entry in list {
            match AddressRecord::from_str(&entry) {
                Ok(record) => {
                    self.insert(record);
                    loaded += 1;
                }
                Err(e) => tracing::warn!(table = self.table, error = %e, "Skipping stored entry"),
            }
        }
        Ok(loaded)
    }

    fn insert(&self, record: AddressRecord) -> bool {
        let mut identities = self.entries.entry(record.address).or_default();
        match record.identity {
            Some(identity) => identities.insert(identity),
            None => true,
        }
    }

    fn schedule(&self, op: WriteOp) {
        match self.writes.try_send(op) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(table = self.table, "Store write buffer full, write kept in memory only");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(table = self.table, "Store writer is gone, write kept in memory only");
            }
        }
    }

    pub fn has(&self, address: &IpAddr) -> bool {
        self.entries.contains_key(address)
    }

    pub fn has_identity(&self, address: &IpAddr, identity: &Uuid) -> bool {
        self.entries
            .get(address)
            .is_some_and(|identities| identities.contains(identity))
    }

    pub fn identities(&self, address: &IpAddr) -> Option<Vec<Uuid>> {
        self.entries
            .get(address)
            .map(|identities| identities.iter().copied().collect())
    }

    pub fn add(&self, record: AddressRecord) {
        self.insert(record);
        self.schedule(WriteOp::Add(vec![record.to_entry()]));
    }

    /// Drops the address and all its identities; returns whether it was known
    pub fn remove(&self, address: &IpAddr) -> bool {
        let Some((address, identities)) = self.entries.remove(address) else {
            return false;
        };
        let mut stored: Vec<String> = identities
            .into_iter()
            .map(|identity| AddressRecord::new(address, Some(identity)).to_entry())
            .collect();
        stored.push(AddressRecord::new(address, None).to_entry());
        self.schedule(WriteOp::Remove(stored));
        true
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.schedule(WriteOp::Clear);
    }

    /// Address count; may be stale under concurrent mutation
    pub fn estimated_size(&self) -> usize {
        self.entries.len()
    }
}

impl StoreWriter {
    async fn apply(&self, op: WriteOp) {
        let result = match op {
            WriteOp::Add(list) => self.backend.add_list_to_table(self.table, ENTRIES, list).await,
            WriteOp::Remove(list) => self.backend.remove_from_table(self.table, ENTRIES, list).await,
            WriteOp::Clear => self.backend.clear(self.table).await,
        };
        if let Err(e) = result {
            tracing::error!(
                table = self.table,
                backend = self.backend.name(),
                error = %e,
                "Failed to mirror address write"
            );
        }
    }

    /// Applies writes in order until shutdown, then flushes what is queued
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::debug!(table = self.table, "Store writer started");
        loop {
            tokio::select! {
                op = self.writes.recv() => match op {
                    Some(op) => self.apply(op).await,
                    None => break,
                },
                _ = shutdown.recv() => {
                    let mut flushed = 0;
                    while let Ok(op) = self.writes.try_recv() {
                        self.apply(op).await;
                        flushed += 1;
                    }
                    tracing::info!(table = self.table, flushed = flushed, "💾 Store writer flushed");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::net::Ipv4Addr;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[tokio::test]
    async fn test_add_has_and_identities() {
        let backend = Arc::new(MemoryBackend::new());
        let (store, _writer) = AddressStore::new("verified", backend);
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        store.add(AddressRecord::new(ip(1), Some(alice)));
        assert!(store.has(&ip(1)));
        assert!(store.has_identity(&ip(1), &alice));
        assert!(!store.has_identity(&ip(1), &bob));
        assert!(!store.has(&ip(2)));

        store.add(AddressRecord::new(ip(1), Some(bob)));
        assert_eq!(store.identities(&ip(1)).unwrap().len(), 2);
        assert_eq!(store.estimated_size(), 1);
    }

    #[tokio::test]
    async fn test_writer_mirrors_and_flushes_on_shutdown() {
        let backend = Arc::new(MemoryBackend::new());
        let (store, writer) = AddressStore::new("verified", backend.clone());
        let (tx, rx) = broadcast::channel(1);
        let identity = Uuid::new_v4();

        store.add(AddressRecord::new(ip(1), Some(identity)));
        store.add(AddressRecord::new(ip(2), Some(identity)));
        store.remove(&ip(2));
        tx.send(()).unwrap();
        writer.run(rx).await;

        let stored = backend.get_list_from_table("verified", ENTRIES).await.unwrap();
        assert_eq!(stored, vec![format!("10.0.0.1,{identity}")]);
    }

    #[tokio::test]
    async fn test_full_write_buffer_keeps_memory_authoritative() {
        let backend = Arc::new(MemoryBackend::new());
        let (store, writer) = AddressStore::with_buffer("verified", backend.clone(), 1);
        let (tx, rx) = broadcast::channel(1);

        for last in 1..=3 {
            store.add(AddressRecord::new(ip(last), Some(Uuid::new_v4())));
        }
        assert!((1..=3).all(|last| store.has(&ip(last))));

        tx.send(()).unwrap();
        writer.run(rx).await;
        let stored = backend.get_list_from_table("verified", ENTRIES).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].starts_with("10.0.0.1,"));
    }

    #[tokio::test]
    async fn test_load_restores_records_and_skips_garbage() {
        let backend = Arc::new(MemoryBackend::new());
        let identity = Uuid::new_v4();
        backend
            .add_list_to_table(
                "verified",
                ENTRIES,
                vec![format!("10.0.0.7,{identity}"), "not an address".into()],
            )
            .await
            .unwrap();

        let (store, _writer) = AddressStore::new("verified", backend.clone());
        assert_eq!(store.load(backend.as_ref()).await.unwrap(), 1);
        assert!(store.has_identity(&ip(7), &identity));
    }

    #[tokio::test]
    async fn test_blacklist_entries_without_identity() {
        let backend = Arc::new(MemoryBackend::new());
        let (store, writer) = AddressStore::new("blacklist", backend.clone());
        let (tx, rx) = broadcast::channel(1);

        store.add(AddressRecord::new(ip(3), None));
        assert!(store.has(&ip(3)));
        assert!(store.identities(&ip(3)).unwrap().is_empty());

        store.clear();
        assert!(!store.has(&ip(3)));
        tx.send(()).unwrap();
        writer.run(rx).await;
        assert!(backend.get_list_from_table("blacklist", ENTRIES).await.unwrap().is_empty());
    }

    struct BrokenBackend;

    #[async_trait]
    impl AddressBackend for BrokenBackend {
        fn name(&self) -> &'static str {
            "broken"
        }
        async fn initialize(&self) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn get_list_from_table(&self, _: &str, _: &str) -> Result<Vec<String>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn add_list_to_table(&self, _: &str, _: &str, _: Vec<String>) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn remove_from_table(&self, _: &str, _: &str, _: Vec<String>) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn clear(&self, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn dispose(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_backend_errors_stay_local() {
        let (store, writer) = AddressStore::new("verified", Arc::new(BrokenBackend));
        let (tx, rx) = broadcast::channel(1);
        store.add(AddressRecord::new(ip(9), Some(Uuid::new_v4())));
        assert!(store.remove(&ip(9)));
        assert!(!store.remove(&ip(9)));
        tx.send(()).unwrap();
        writer.run(rx).await;
        assert_eq!(store.estimated_size(), 0);
    }
}
