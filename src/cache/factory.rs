// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::cache::{JsonCache, MemoryCache, NoopCache, PipelineCache};
use crate::config::CacheConfig;
use crate::errors::StorageError;
use crate::storage::{create_blob_storage, FileStorage};
use std::sync::Arc;

/// Builds the cache named by `config`.
pub fn create_cache(config: &CacheConfig) -> Result<Arc<dyn PipelineCache>, StorageError> {
    let cache: Arc<dyn PipelineCache> = match config {
        CacheConfig::None => Arc::new(NoopCache),
        CacheConfig::Memory => Arc::new(MemoryCache::new()),
        CacheConfig::File { base_dir } => {
            Arc::new(JsonCache::new(Arc::new(FileStorage::new(base_dir))))
        }
        CacheConfig::Blob(blob) => {
            Arc::new(JsonCache::new(Arc::new(create_blob_storage(blob, "cache")?)))
        }
    };
    tracing::debug!(cache = ?config, "cache initialized");
    Ok(cache)
}
