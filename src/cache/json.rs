// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::cache::{storable, PipelineCache};
use crate::errors::CacheError;
use crate::observability::messages::storage::CacheEntryDiscarded;
use crate::observability::messages::StructuredLog;
use crate::storage::PipelineStorage;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Cache persisted through a [`PipelineStorage`].
///
/// Each entry is a file named by its key holding `{"result": <value>, ...debug}`.
/// Entries that no longer parse are deleted and reported as misses.
#[derive(Clone)]
pub struct JsonCache {
    storage: Arc<dyn PipelineStorage>,
}

impl JsonCache {
    pub fn new(storage: Arc<dyn PipelineStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl PipelineCache for JsonCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let Some(text) = self.storage.get_text(key, None).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(mut entry)) => Ok(storable(entry.remove("result"))),
            Ok(_) => {
                self.discard(key, "entry is not a JSON object").await?;
                Ok(None)
            }
            Err(e) => {
                self.discard(key, &e.to_string()).await?;
                Ok(None)
            }
        }
    }

    async fn set(
        &self,
        key: &str,
        value: Option<Value>,
        debug: Option<Map<String, Value>>,
    ) -> Result<(), CacheError> {
        let Some(value) = storable(value) else {
            return Ok(());
        };
        let mut entry = debug.unwrap_or_default();
        entry.insert("result".to_string(), value);
        let text = serde_json::to_string(&Value::Object(entry)).map_err(|source| {
            CacheError::Serialize {
                key: key.to_string(),
                source,
            }
        })?;
        self.storage.set_text(key, &text, None).await?;
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.storage.has(key).await?)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        Ok(self.storage.delete(key).await?)
    }

    async fn clear(&self) -> Result<(), CacheError> {
        Ok(self.storage.clear().await?)
    }

    fn child(&self, namespace: &str) -> Result<Arc<dyn PipelineCache>, CacheError> {
        Ok(Arc::new(Self::new(self.storage.child(namespace)?)))
    }
}

impl JsonCache {
    async fn discard(&self, key: &str, reason: &str) -> Result<(), CacheError> {
        CacheEntryDiscarded { key, reason }.log();
        Ok(self.storage.delete(key).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde_json::json;

    #[tokio::test]
    async fn test_entry_layout_includes_debug_fields() {
        let storage = Arc::new(MemoryStorage::new());
        let cache = JsonCache::new(storage.clone());

        let mut debug = Map::new();
        debug.insert("input".to_string(), json!("prompt text"));
        cache
            .set("chat-abc", Some(json!("output")), Some(debug))
            .await
            .unwrap();

        let raw = storage.get_text("chat-abc", None).await.unwrap().unwrap();
        let parsed: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["result"], json!("output"));
        assert_eq!(parsed["input"], json!("prompt text"));
        assert_eq!(cache.get("chat-abc").await.unwrap(), Some(json!("output")));
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_deleted() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set("bad", b"{not json").await.unwrap();
        let cache = JsonCache::new(storage.clone());

        assert_eq!(cache.get("bad").await.unwrap(), None);
        assert!(!storage.has("bad").await.unwrap());
    }

    #[tokio::test]
    async fn test_child_namespaces_map_to_storage_children() {
        let storage = Arc::new(MemoryStorage::new());
        let cache = JsonCache::new(storage.clone());
        let child = cache.child("extract_graph").unwrap();

        child.set("k", Some(json!(1)), None).await.unwrap();
        assert!(storage.has("extract_graph/k").await.unwrap());
        assert!(!cache.has("k").await.unwrap());
    }
}
