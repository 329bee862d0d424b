//! Document storage behind the booking services.
//!
//! `DocumentStore` is the handle every cell receives; the process entry point
//! decides whether it is backed by Redis or kept in memory.

pub mod memory;
pub mod redis_store;
pub mod store;

pub use memory::MemoryDocumentStore;
pub use redis_store::RedisDocumentStore;
pub use store::{fetch, fetch_in, from_document, to_document, DocumentStore, StoreError, StoreTransaction};
