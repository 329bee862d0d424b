use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Transaction aborted: {0} was modified concurrently")]
    TransactionAborted(String),

    #[error("Transaction read {0} after a write; all reads must come first")]
    ReadAfterWrite(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, StoreError::TransactionAborted(_))
    }
}

/// Keyed JSON document storage with an optimistic transaction primitive.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    async fn set(&self, collection: &str, id: &str, document: Value) -> Result<(), StoreError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Every live document of a collection, in no particular order.
    async fn list(&self, collection: &str) -> Result<Vec<Value>, StoreError>;

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;
}

/// A read-then-write unit of work.
///
/// Reads are tracked; writes are buffered and applied all at once on
/// [`StoreTransaction::commit`]. If any document read through the transaction
/// changed before commit, nothing is written and commit returns
/// [`StoreError::TransactionAborted`].
#[async_trait]
pub trait StoreTransaction: Send {
    async fn get(&mut self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    fn set(&mut self, collection: &str, id: &str, document: Value) -> Result<(), StoreError>;

    fn delete(&mut self, collection: &str, id: &str) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

pub fn to_document<T: Serialize>(value: &T) -> Result<Value, StoreError> {
    Ok(serde_json::to_value(value)?)
}

pub fn from_document<T: DeserializeOwned>(document: Value) -> Result<T, StoreError> {
    Ok(serde_json::from_value(document)?)
}

pub async fn fetch<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
) -> Result<Option<T>, StoreError> {
    store
        .get(collection, id)
        .await?
        .map(from_document)
        .transpose()
}

pub async fn fetch_in<T: DeserializeOwned>(
    tx: &mut dyn StoreTransaction,
    collection: &str,
    id: &str,
) -> Result<Option<T>, StoreError> {
    tx.get(collection, id).await?.map(from_document).transpose()
}
