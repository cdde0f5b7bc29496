// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::{BlobConfig, StorageConfig};
use crate::errors::{StorageError, ValidationError};
use crate::observability::messages::storage::StorageInitialized;
use crate::observability::messages::StructuredLog;
use crate::storage::{BlobStorage, FileStorage, MemoryStorage, PipelineStorage};
use std::sync::Arc;

/// Builds the storage backend named by `config`.
pub fn create_storage(config: &StorageConfig) -> Result<Arc<dyn PipelineStorage>, StorageError> {
    let storage: Arc<dyn PipelineStorage> = match config {
        StorageConfig::Memory => Arc::new(MemoryStorage::new()),
        StorageConfig::File { base_dir } => Arc::new(FileStorage::new(base_dir)),
        StorageConfig::Blob(blob) => Arc::new(create_blob_storage(blob, "storage")?),
    };

    StorageInitialized {
        backend: config.kind(),
        root: &storage.describe(),
    }
    .log();

    Ok(storage)
}

/// Builds a blob backend, reporting a missing container against `section`.
pub(crate) fn create_blob_storage(
    config: &BlobConfig,
    section: &str,
) -> Result<BlobStorage, StorageError> {
    let container = config
        .container_name
        .as_deref()
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| ValidationError::MissingContainerName {
            section: section.to_string(),
        })?;
    BlobStorage::new(container, config.credentials(), config.base_dir.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_and_file_backends() {
        let dir = tempfile::TempDir::new().unwrap();
        let configs = vec![
            StorageConfig::Memory,
            StorageConfig::File {
                base_dir: dir.path().display().to_string(),
            },
        ];

        for config in configs {
            let storage = create_storage(&config).unwrap();
            storage.set("probe", b"ok").await.unwrap();
            assert_eq!(storage.get("probe").await.unwrap(), Some(b"ok".to_vec()));
        }
    }

    #[test]
    fn test_blob_without_container_is_rejected() {
        let config = StorageConfig::Blob(BlobConfig::default());
        assert!(matches!(
            create_storage(&config),
            Err(StorageError::Config(ValidationError::MissingContainerName { .. }))
        ));
    }
}
