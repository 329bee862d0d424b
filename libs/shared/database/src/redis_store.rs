use async_trait::async_trait;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use redis::AsyncCommands;
use serde_json::Value;
use tracing::{debug, info};

use shared_config::AppConfig;

use crate::store::{DocumentStore, StoreError, StoreTransaction};

/// Documents stored as JSON strings under `{namespace}:{collection}:{id}`.
///
/// Transactions WATCH every key they read and apply their writes in a single
/// MULTI/EXEC block, so a concurrent write to a read key turns EXEC into a nil
/// reply.
pub struct RedisDocumentStore {
    pool: Pool,
    namespace: String,
}

impl RedisDocumentStore {
    pub async fn connect(config: &AppConfig) -> Result<Self, StoreError> {
        let redis_url = config
            .redis_url
            .clone()
            .unwrap_or_else(|| "redis://localhost:6379".to_string());

        let cfg = Config::from_url(redis_url);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| StoreError::Pool(format!("Pool creation error: {}", e)))?;

        // Test connection
        let mut conn = pool
            .get()
            .await
            .map_err(|e| StoreError::Pool(format!("Connection error: {}", e)))?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        info!("Redis document store initialized (namespace {})", config.store_namespace);

        Ok(Self {
            pool,
            namespace: config.store_namespace.clone(),
        })
    }

    async fn get_connection(&self) -> Result<Connection, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Pool(e.to_string()))
    }

    fn key(&self, collection: &str, id: &str) -> String {
        redis_key(&self.namespace, collection, id)
    }
}

fn redis_key(namespace: &str, collection: &str, id: &str) -> String {
    format!("{}:{}:{}", namespace, collection, id)
}

fn parse_document(raw: Option<String>) -> Result<Option<Value>, StoreError> {
    raw.map(|body| serde_json::from_str(&body))
        .transpose()
        .map_err(StoreError::from)
}

#[async_trait]
impl DocumentStore for RedisDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let mut conn = self.get_connection().await?;
        let raw: Option<String> = conn.get(self.key(collection, id)).await?;
        parse_document(raw)
    }

    async fn set(&self, collection: &str, id: &str, document: Value) -> Result<(), StoreError> {
        let mut conn = self.get_connection().await?;
        let _: () = conn.set(self.key(collection, id), document.to_string()).await?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let mut conn = self.get_connection().await?;
        let _: () = conn.del(self.key(collection, id)).await?;
        Ok(())
    }

    async fn list(&self, collection: &str) -> Result<Vec<Value>, StoreError> {
        let mut conn = self.get_connection().await?;
        let pattern = format!("{}*", redis_key(&self.namespace, collection, ""));

        let mut keys: Vec<String> = Vec::new();
        {
            let mut iter = conn.scan_match::<_, String>(pattern).await?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }

        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let raw: Vec<Option<String>> = redis::cmd("MGET").arg(&keys).query_async(&mut conn).await?;
        let mut documents = Vec::with_capacity(raw.len());
        for body in raw {
            if let Some(document) = parse_document(body)? {
                documents.push(document);
            }
        }
        Ok(documents)
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let conn = self.get_connection().await?;
        Ok(Box::new(RedisTransaction {
            conn,
            namespace: self.namespace.clone(),
            watched: Vec::new(),
            writes: Vec::new(),
        }))
    }
}

pub struct RedisTransaction {
    conn: Connection,
    namespace: String,
    watched: Vec<String>,
    writes: Vec<(String, Option<Value>)>,
}

impl RedisTransaction {
    async fn unwatch(&mut self) -> Result<(), StoreError> {
        if !self.watched.is_empty() {
            let _: () = redis::cmd("UNWATCH").query_async(&mut self.conn).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for RedisTransaction {
    async fn get(&mut self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let key = redis_key(&self.namespace, collection, id);
        if !self.writes.is_empty() {
            return Err(StoreError::ReadAfterWrite(key));
        }

        let _: () = redis::cmd("WATCH").arg(&key).query_async(&mut self.conn).await?;
        let raw: Option<String> = self.conn.get(&key).await?;
        self.watched.push(key);
        parse_document(raw)
    }

    fn set(&mut self, collection: &str, id: &str, document: Value) -> Result<(), StoreError> {
        let key = redis_key(&self.namespace, collection, id);
        self.writes.push((key, Some(document)));
        Ok(())
    }

    fn delete(&mut self, collection: &str, id: &str) -> Result<(), StoreError> {
        let key = redis_key(&self.namespace, collection, id);
        self.writes.push((key, None));
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        if self.writes.is_empty() {
            return self.unwatch().await;
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, body) in &self.writes {
            match body {
                Some(document) => pipe.set(key, document.to_string()),
                None => pipe.del(key),
            };
        }

        let reply: Option<Vec<redis::Value>> = pipe.query_async(&mut self.conn).await?;
        match reply {
            Some(_) => {
                debug!("Redis transaction committed {} writes", self.writes.len());
                Ok(())
            }
            None => Err(StoreError::TransactionAborted(self.watched.join(", "))),
        }
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), StoreError> {
        self.unwatch().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_by_collection() {
        assert_eq!(
            redis_key("hospital", "slots", "d1_2024-01-15_09-00"),
            "hospital:slots:d1_2024-01-15_09-00"
        );
    }

    #[test]
    fn absent_documents_parse_to_none() {
        assert!(parse_document(None).unwrap().is_none());
        assert!(parse_document(Some("{\"a\":1}".to_string())).unwrap().is_some());
        assert!(parse_document(Some("not json".to_string())).is_err());
    }
}
