use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Contract of the backing document store: named collections of JSON
/// records addressed by a string id. This is all the game needs from the
/// external realtime database, so swapping the backend is a matter of
/// implementing these three calls.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Saves a record and returns its id. A record carrying a string `id`
    /// field keeps it; otherwise an id is generated and written into the
    /// record.
    async fn save(&self, collection: &str, record: Value) -> Result<String>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>>;

    async fn query(
        &self,
        collection: &str,
        filter: &(dyn for<'a> Fn(&'a Value) -> bool + Send + Sync),
    ) -> Result<Vec<Value>>;
}

/// In-memory store used by tests and single-node deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, HashMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn save(&self, collection: &str, mut record: Value) -> Result<String> {
        let id = record
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        if let Value::Object(map) = &mut record {
            map.entry("id")
                .or_insert_with(|| Value::String(id.clone()));
        }

        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), record);
        tracing::debug!("Saved record {} into {}", id, collection);
        Ok(id)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|records| records.get(id))
            .cloned())
    }

    async fn query(
        &self,
        collection: &str,
        filter: &(dyn for<'a> Fn(&'a Value) -> bool + Send + Sync),
    ) -> Result<Vec<Value>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|records| {
                records
                    .values()
                    .filter(|record| filter(record))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
