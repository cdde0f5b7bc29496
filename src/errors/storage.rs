// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors for durable storage backends.

use crate::errors::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O failed for '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("storage key '{key}' is not allowed: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("blob storage operation failed: {0}")]
    Blob(#[from] opendal::Error),

    #[error("invalid find pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("value stored under '{key}' is not valid utf-8")]
    Encoding { key: String },

    #[error(transparent)]
    Config(#[from] ValidationError),
}

impl StorageError {
    pub fn io(key: impl Into<String>, source: std::io::Error) -> Self {
        StorageError::Io {
            key: key.into(),
            source,
        }
    }

    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        StorageError::InvalidKey {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
