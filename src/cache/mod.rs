// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Content-addressable response cache.
//!
//! Values are replayed verbatim on a hit. Keys come from [`cache_key`], so a
//! given (operation tag, prompt, parameters) triple always maps to the same
//! entry and entries of different operations never meet.

mod factory;
mod json;
mod key;
mod memory;
mod noop;

pub use factory::create_cache;
pub use json::JsonCache;
pub use key::{cache_key, canonical_json};
pub use memory::MemoryCache;
pub use noop::NoopCache;

use crate::errors::CacheError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

#[async_trait]
pub trait PipelineCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    /// Stores `value` under `key` with optional debug fields.
    ///
    /// An absent or `null` value is never stored.
    async fn set(
        &self,
        key: &str,
        value: Option<Value>,
        debug: Option<Map<String, Value>>,
    ) -> Result<(), CacheError>;

    async fn has(&self, key: &str) -> Result<bool, CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    async fn clear(&self) -> Result<(), CacheError>;

    /// A view whose keys are implicitly prefixed by `namespace`.
    fn child(&self, namespace: &str) -> Result<Arc<dyn PipelineCache>, CacheError>;
}

/// `None` and `Some(Value::Null)` both mean "no answer".
pub(crate) fn storable(value: Option<Value>) -> Option<Value> {
    value.filter(|v| !v.is_null())
}
