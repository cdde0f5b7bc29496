// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for storage and cache backends.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Storage backend created.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use graphrag_indexer::observability::messages::storage::StorageInitialized;
///
/// let msg = StorageInitialized {
///     backend: "file",
///     root: "output",
/// };
///
/// assert_eq!(msg.to_string(), "Initialized file storage at 'output'");
/// ```
pub struct StorageInitialized<'a> {
    pub backend: &'a str,
    pub root: &'a str,
}

impl Display for StorageInitialized<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Initialized {} storage at '{}'", self.backend, self.root)
    }
}

impl StructuredLog for StorageInitialized<'_> {
    fn log(&self) {
        tracing::info!(backend = self.backend, root = self.root, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("storage", span_name = name, backend = self.backend, root = self.root)
    }
}

/// A persisted cache entry could not be parsed and was removed.
///
/// # Log Level
/// `warn!` - Potential issue or degraded behavior
pub struct CacheEntryDiscarded<'a> {
    pub key: &'a str,
    pub reason: &'a str,
}

impl Display for CacheEntryDiscarded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Discarded unreadable cache entry '{}': {}", self.key, self.reason)
    }
}

impl StructuredLog for CacheEntryDiscarded<'_> {
    fn log(&self) {
        tracing::warn!(key = self.key, reason = self.reason, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("cache_discard", span_name = name, key = self.key)
    }
}
