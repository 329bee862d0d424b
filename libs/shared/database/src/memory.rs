use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::store::{DocumentStore, StoreError, StoreTransaction};

/// In-process store used when no Redis is configured, and by tests.
///
/// Every write bumps a global version counter. Deletions leave a tombstone so
/// that a transaction which observed "absent" still notices a create+delete
/// that happened in between. Tombstones are dropped again once no
/// transaction is open.
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    state: Arc<RwLock<MemoryState>>,
    open_transactions: Arc<AtomicUsize>,
}

#[derive(Default)]
struct MemoryState {
    documents: HashMap<String, VersionedDocument>,
    clock: u64,
}

struct VersionedDocument {
    version: u64,
    body: Option<Value>,
}

impl MemoryState {
    fn version_of(&self, key: &str) -> u64 {
        self.documents.get(key).map(|doc| doc.version).unwrap_or(0)
    }

    fn write(&mut self, key: String, body: Option<Value>) {
        self.clock += 1;
        self.documents.insert(key, VersionedDocument { version: self.clock, body });
    }

    /// Only safe while no transaction holds a read version. The clock keeps
    /// running, so a key recreated later never reuses an old version.
    fn prune_tombstones(&mut self) {
        let before = self.documents.len();
        self.documents.retain(|_, doc| doc.body.is_some());
        let pruned = before - self.documents.len();
        if pruned > 0 {
            debug!("Pruned {} tombstones", pruned);
        }
    }
}

fn document_key(collection: &str, id: &str) -> String {
    format!("{}/{}", collection, id)
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Version stamp of a live document, `None` when absent.
    pub async fn version(&self, collection: &str, id: &str) -> Option<u64> {
        let state = self.state.read().await;
        state
            .documents
            .get(&document_key(collection, id))
            .filter(|doc| doc.body.is_some())
            .map(|doc| doc.version)
    }

    /// Ids of the live documents in a collection.
    pub async fn ids(&self, collection: &str) -> Vec<String> {
        let prefix = format!("{}/", collection);
        let state = self.state.read().await;
        let mut ids: Vec<String> = state
            .documents
            .iter()
            .filter(|(_, doc)| doc.body.is_some())
            .filter_map(|(key, _)| key.strip_prefix(&prefix).map(str::to_string))
            .collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .documents
            .get(&document_key(collection, id))
            .and_then(|doc| doc.body.clone()))
    }

    async fn set(&self, collection: &str, id: &str, document: Value) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.write(document_key(collection, id), Some(document));
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let key = document_key(collection, id);
        if state.documents.get(&key).is_some_and(|doc| doc.body.is_some()) {
            state.write(key, None);
        }
        if self.open_transactions.load(Ordering::SeqCst) == 0 {
            state.prune_tombstones();
        }
        Ok(())
    }

    async fn list(&self, collection: &str) -> Result<Vec<Value>, StoreError> {
        let prefix = format!("{}/", collection);
        let state = self.state.read().await;
        Ok(state
            .documents
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .filter_map(|(_, doc)| doc.body.clone())
            .collect())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        self.open_transactions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryTransaction {
            state: Arc::clone(&self.state),
            open_transactions: Arc::clone(&self.open_transactions),
            reads: HashMap::new(),
            writes: Vec::new(),
        }))
    }
}

pub struct MemoryTransaction {
    state: Arc<RwLock<MemoryState>>,
    open_transactions: Arc<AtomicUsize>,
    reads: HashMap<String, u64>,
    writes: Vec<(String, Option<Value>)>,
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        self.open_transactions.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn get(&mut self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let key = document_key(collection, id);
        if !self.writes.is_empty() {
            return Err(StoreError::ReadAfterWrite(key));
        }

        let state = self.state.read().await;
        let (version, body) = match state.documents.get(&key) {
            Some(doc) => (doc.version, doc.body.clone()),
            None => (0, None),
        };
        self.reads.entry(key).or_insert(version);
        Ok(body)
    }

    fn set(&mut self, collection: &str, id: &str, document: Value) -> Result<(), StoreError> {
        self.writes.push((document_key(collection, id), Some(document)));
        Ok(())
    }

    fn delete(&mut self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.writes.push((document_key(collection, id), None));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut state = self.state.write().await;

        for (key, seen) in &self.reads {
            if state.version_of(key) != *seen {
                debug!("Memory transaction aborted on {}", key);
                return Err(StoreError::TransactionAborted(key.clone()));
            }
        }

        for (key, body) in &self.writes {
            state.write(key.clone(), body.clone());
        }
        // this transaction still counts as open until it is dropped
        if self.open_transactions.load(Ordering::SeqCst) == 1 {
            state.prune_tombstones();
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
