// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors for the layered model client.

use crate::errors::CacheError;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("connection to model provider failed: {0}")]
    Connection(String),

    #[error("model provider returned server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("model provider rate limited the request: {message}")]
    RateLimited {
        message: String,
        /// Provider recommended wait, when the response carried one
        retry_after: Option<Duration>,
    },

    #[error("model provider rejected the request with {status}: {message}")]
    Api { status: u16, message: String },

    #[error("failed to decode model provider response: {0}")]
    Decode(String),

    #[error("model output for '{name}' is not valid structured output: {reason}")]
    StructuredOutput { name: String, reason: String },

    #[error("operation '{operation}' failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last_error: Box<LlmError>,
    },

    #[error("model client configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl LlmError {
    /// Connection, server and rate-limit failures are transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::Connection(_) | LlmError::Server { .. } | LlmError::RateLimited { .. }
        )
    }

    /// Recommended wait carried by a rate-limit response.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            LlmError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
