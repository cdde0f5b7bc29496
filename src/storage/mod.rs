// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Durable key/blob storage.
//!
//! Every pipeline artifact (checkpoints, statistics, cache entries, input
//! documents) moves through [`PipelineStorage`]. Keys are `/` separated
//! relative paths; [`PipelineStorage::child`] returns a view rooted at a
//! sub-namespace so independent subsystems never collide.
//!
//! Three backends are provided:
//! * [`MemoryStorage`] - volatile, process lifetime
//! * [`FileStorage`] - rooted at a local directory, keys may not escape it
//! * [`BlobStorage`] - an Azure-style blob container through OpenDAL

mod blob;
mod factory;
mod file;
mod memory;

pub use blob::{BlobCredentials, BlobStorage};
pub use factory::create_storage;
pub(crate) use factory::create_blob_storage;
pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::config::is_utf8;
use crate::errors::{StorageError, ValidationError};
use async_trait::async_trait;
use futures::stream::BoxStream;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

/// Captured named groups of a [`PipelineStorage::find`] match.
pub type CapturedGroups = HashMap<String, String>;

/// Lazy stream of `(key, captured groups)` produced by [`PipelineStorage::find`].
pub type FindStream<'a> = BoxStream<'a, Result<(String, CapturedGroups), StorageError>>;

/// Options narrowing a [`PipelineStorage::find`] call.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Only keys below this directory are considered.
    pub base_dir: Option<String>,
    /// Per-group equality filters; a key matches only if every listed group
    /// captured exactly the given value.
    pub filter: Option<HashMap<String, String>>,
    /// Stop after this many matches.
    pub max_count: Option<usize>,
}

#[async_trait]
pub trait PipelineStorage: Send + Sync {
    /// Returns the raw bytes stored under `key`, or `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    async fn has(&self, key: &str) -> Result<bool, StorageError>;

    /// Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Removes every key in this namespace, including children.
    async fn clear(&self) -> Result<(), StorageError>;

    /// Every key below `base_dir` (or the whole namespace), relative to this
    /// storage's root.
    async fn list_keys(&self, base_dir: Option<&str>) -> Result<Vec<String>, StorageError>;

    /// A view of this storage rooted at `name`.
    fn child(&self, name: &str) -> Result<Arc<dyn PipelineStorage>, StorageError>;

    /// Human readable location, for logs.
    fn describe(&self) -> String;

    /// Reads `key` as text. Only utf-8 is supported.
    async fn get_text(
        &self,
        key: &str,
        encoding: Option<&str>,
    ) -> Result<Option<String>, StorageError> {
        check_encoding(encoding)?;
        match self.get(key).await? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| StorageError::Encoding {
                    key: key.to_string(),
                }),
            None => Ok(None),
        }
    }

    async fn set_text(
        &self,
        key: &str,
        value: &str,
        encoding: Option<&str>,
    ) -> Result<(), StorageError> {
        check_encoding(encoding)?;
        self.set(key, value.as_bytes()).await
    }

    /// Streams every key matching `pattern`, with its named capture groups.
    ///
    /// Keys that do not match, or whose groups fail `options.filter`, are
    /// skipped. The listing is taken when the stream is first polled, so each
    /// call observes the storage as it is at that time.
    fn find<'a>(&'a self, pattern: &Regex, options: FindOptions) -> FindStream<'a> {
        let pattern = pattern.clone();
        Box::pin(async_stream::try_stream! {
            let keys = self.list_keys(options.base_dir.as_deref()).await?;
            let mut matched = 0usize;
            for key in keys {
                if options.max_count.is_some_and(|max| matched >= max) {
                    break;
                }
                let Some(groups) = match_key(&pattern, &key) else {
                    continue;
                };
                if !passes_filter(&groups, options.filter.as_ref()) {
                    continue;
                }
                matched += 1;
                yield (key, groups);
            }
        })
    }
}

fn check_encoding(encoding: Option<&str>) -> Result<(), StorageError> {
    match encoding {
        None => Ok(()),
        Some(enc) if is_utf8(enc) => Ok(()),
        Some(enc) => Err(ValidationError::UnsupportedEncoding {
            encoding: enc.to_string(),
        }
        .into()),
    }
}

fn match_key(pattern: &Regex, key: &str) -> Option<CapturedGroups> {
    let captures = pattern.captures(key)?;
    Some(
        pattern
            .capture_names()
            .flatten()
            .filter_map(|name| {
                captures
                    .name(name)
                    .map(|m| (name.to_string(), m.as_str().to_string()))
            })
            .collect(),
    )
}

fn passes_filter(groups: &CapturedGroups, filter: Option<&HashMap<String, String>>) -> bool {
    filter.map_or(true, |filter| {
        filter
            .iter()
            .all(|(group, expected)| groups.get(group) == Some(expected))
    })
}

/// Joins `/` separated path segments, skipping empty ones.
pub(crate) fn join_key(prefix: &str, key: &str) -> String {
    match (prefix.trim_matches('/'), key.trim_start_matches('/')) {
        ("", key) => key.to_string(),
        (prefix, "") => prefix.to_string(),
        (prefix, key) => format!("{}/{}", prefix, key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn test_find_with_groups_and_filter() {
        let storage = MemoryStorage::new();
        for key in ["2024/a.txt", "2024/b.txt", "2023/c.txt", "notes.md"] {
            storage.set(key, b"x").await.unwrap();
        }

        let pattern = Regex::new(r"^(?P<year>\d{4})/(?P<name>\w+)\.txt$").unwrap();
        let mut all: Vec<_> = storage
            .find(&pattern, FindOptions::default())
            .try_collect()
            .await
            .unwrap();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].1.get("year"), Some(&"2023".to_string()));

        let filter = HashMap::from([("year".to_string(), "2024".to_string())]);
        let filtered: Vec<_> = storage
            .find(
                &pattern,
                FindOptions {
                    filter: Some(filter),
                    ..Default::default()
                },
            )
            .try_collect()
            .await
            .unwrap();
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|(key, _)| key.starts_with("2024/")));
    }

    #[tokio::test]
    async fn test_find_is_restartable_and_bounded() {
        let storage = MemoryStorage::new();
        for i in 0..5 {
            storage.set(&format!("doc{}.txt", i), b"x").await.unwrap();
        }
        let pattern = Regex::new(r"\.txt$").unwrap();
        let options = FindOptions {
            max_count: Some(2),
            ..Default::default()
        };

        let first: Vec<_> = storage
            .find(&pattern, options.clone())
            .try_collect()
            .await
            .unwrap();
        let second: Vec<_> = storage.find(&pattern, options).try_collect().await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
    }

    #[tokio::test]
    async fn test_get_text_rejects_other_encodings() {
        let storage = MemoryStorage::new();
        storage.set("a", b"hello").await.unwrap();

        assert_eq!(
            storage.get_text("a", Some("UTF-8")).await.unwrap(),
            Some("hello".to_string())
        );
        assert!(matches!(
            storage.get_text("a", Some("latin-1")).await,
            Err(StorageError::Config(ValidationError::UnsupportedEncoding { .. }))
        ));
    }

    #[test]
    fn test_join_key() {
        let cases = vec![
            ("", "a.txt", "a.txt"),
            ("run", "a.txt", "run/a.txt"),
            ("run/", "/a.txt", "run/a.txt"),
            ("run", "", "run"),
        ];
        for (prefix, key, expected) in cases {
            assert_eq!(join_key(prefix, key), expected);
        }
    }
}
