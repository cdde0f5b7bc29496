// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::cache::{storable, PipelineCache};
use crate::errors::CacheError;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::sync::Arc;

/// In-process cache; children share the parent's map under a key prefix.
#[derive(Clone, Default)]
pub struct MemoryCache {
    entries: Arc<DashMap<String, Value>>,
    prefix: String,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl PipelineCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        Ok(self
            .entries
            .get(&self.full_key(key))
            .map(|v| v.value().clone()))
    }

    async fn set(
        &self,
        key: &str,
        value: Option<Value>,
        _debug: Option<Map<String, Value>>,
    ) -> Result<(), CacheError> {
        if let Some(value) = storable(value) {
            self.entries.insert(self.full_key(key), value);
        }
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.contains_key(&self.full_key(key)))
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(&self.full_key(key));
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let prefix = self.prefix.clone();
        self.entries.retain(|key, _| !key.starts_with(&prefix));
        Ok(())
    }

    fn child(&self, namespace: &str) -> Result<Arc<dyn PipelineCache>, CacheError> {
        Ok(Arc::new(Self {
            entries: Arc::clone(&self.entries),
            prefix: format!("{}{}:", self.prefix, namespace),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_absent_values_are_not_stored() {
        let cache = MemoryCache::new();
        cache.set("a", None, None).await.unwrap();
        cache.set("b", Some(Value::Null), None).await.unwrap();
        assert!(!cache.has("a").await.unwrap());
        assert!(!cache.has("b").await.unwrap());

        cache.set("c", Some(json!("answer")), None).await.unwrap();
        assert_eq!(cache.get("c").await.unwrap(), Some(json!("answer")));
    }

    #[tokio::test]
    async fn test_sibling_children_do_not_collide() {
        let cache = MemoryCache::new();
        let extract = cache.child("extract_graph").unwrap();
        let summarize = cache.child("summarize").unwrap();

        extract.set("k", Some(json!(1)), None).await.unwrap();
        summarize.set("k", Some(json!(2)), None).await.unwrap();
        assert_eq!(extract.get("k").await.unwrap(), Some(json!(1)));
        assert_eq!(summarize.get("k").await.unwrap(), Some(json!(2)));

        extract.clear().await.unwrap();
        assert_eq!(extract.get("k").await.unwrap(), None);
        assert_eq!(summarize.get("k").await.unwrap(), Some(json!(2)));
    }
}
