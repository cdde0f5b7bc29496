// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::cache::PipelineCache;
use crate::errors::CacheError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Cache used when caching is disabled: always misses, stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

#[async_trait]
impl PipelineCache for NoopCache {
    async fn get(&self, _key: &str) -> Result<Option<Value>, CacheError> {
        Ok(None)
    }

    async fn set(
        &self,
        _key: &str,
        _value: Option<Value>,
        _debug: Option<Map<String, Value>>,
    ) -> Result<(), CacheError> {
        Ok(())
    }

    async fn has(&self, _key: &str) -> Result<bool, CacheError> {
        Ok(false)
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        Ok(())
    }

    fn child(&self, _namespace: &str) -> Result<Arc<dyn PipelineCache>, CacheError> {
        Ok(Arc::new(NoopCache))
    }
}
