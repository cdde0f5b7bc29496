// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::StorageError;
use crate::storage::{join_key, PipelineStorage};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// Volatile storage shared by a root and all of its children.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<DashMap<String, Vec<u8>>>,
    prefix: String,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn full_key(&self, key: &str) -> String {
        join_key(&self.prefix, key)
    }

    fn in_namespace(&self, full_key: &str) -> bool {
        self.prefix.is_empty() || full_key.starts_with(&format!("{}/", self.prefix))
    }
}

#[async_trait]
impl PipelineStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self
            .entries
            .get(&self.full_key(key))
            .map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.entries.insert(self.full_key(key), value.to_vec());
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.entries.contains_key(&self.full_key(key)))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(&self.full_key(key));
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.entries.retain(|key, _| !self.in_namespace(key));
        Ok(())
    }

    async fn list_keys(&self, base_dir: Option<&str>) -> Result<Vec<String>, StorageError> {
        let scope = base_dir.map(|dir| self.full_key(dir));
        let strip = if self.prefix.is_empty() {
            0
        } else {
            self.prefix.len() + 1
        };
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|key| self.in_namespace(key))
            .filter(|key| {
                scope
                    .as_ref()
                    .map_or(true, |scope| key.starts_with(&format!("{}/", scope)))
            })
            .map(|key| key[strip..].to_string())
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn child(&self, name: &str) -> Result<Arc<dyn PipelineStorage>, StorageError> {
        Ok(Arc::new(Self {
            entries: Arc::clone(&self.entries),
            prefix: self.full_key(name),
        }))
    }

    fn describe(&self) -> String {
        format!("memory://{}", self.prefix)
    }
}
