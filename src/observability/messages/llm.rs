// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for model client invocation events.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// A retryable model error occurred and another attempt is scheduled.
///
/// # Log Level
/// `warn!` - Potential issue or degraded behavior
pub struct RetryScheduled<'a> {
    pub operation: &'a str,
    pub attempt: u32,
    pub max_retries: u32,
    pub delay: Duration,
    pub error: &'a str,
}

impl Display for RetryScheduled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Attempt {}/{} of '{}' failed, retrying in {:?}: {}",
            self.attempt, self.max_retries, self.operation, self.delay, self.error
        )
    }
}

impl StructuredLog for RetryScheduled<'_> {
    fn log(&self) {
        tracing::warn!(
            operation = self.operation,
            attempt = self.attempt,
            max_retries = self.max_retries,
            delay_ms = self.delay.as_millis() as u64,
            error = self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "llm_retry",
            span_name = name,
            operation = self.operation,
            attempt = self.attempt,
        )
    }
}

/// Every attempt failed.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct RetriesExhausted<'a> {
    pub operation: &'a str,
    pub attempts: u32,
}

impl Display for RetriesExhausted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Operation '{}' exhausted {} attempts",
            self.operation, self.attempts
        )
    }
}

impl StructuredLog for RetriesExhausted<'_> {
    fn log(&self) {
        tracing::error!(operation = self.operation, attempts = self.attempts, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("llm_exhausted", span_name = name, operation = self.operation)
    }
}

/// Response served from the cache.
///
/// # Log Level
/// `debug!` - Detailed diagnostic information
pub struct CacheHit<'a> {
    pub operation: &'a str,
    pub key: &'a str,
}

impl Display for CacheHit<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Cache hit for '{}' ({})", self.operation, self.key)
    }
}

impl StructuredLog for CacheHit<'_> {
    fn log(&self) {
        tracing::debug!(operation = self.operation, key = self.key, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("llm_cache_hit", span_name = name, key = self.key)
    }
}

/// Model output could not be used as JSON and a repair is being attempted.
///
/// # Log Level
/// `warn!` - Potential issue or degraded behavior
pub struct StructuredOutputRepair<'a> {
    pub operation: &'a str,
    pub attempt: u32,
    pub reason: &'a str,
}

impl Display for StructuredOutputRepair<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Output of '{}' rejected on attempt {}: {}",
            self.operation, self.attempt, self.reason
        )
    }
}

impl StructuredLog for StructuredOutputRepair<'_> {
    fn log(&self) {
        tracing::warn!(
            operation = self.operation,
            attempt = self.attempt,
            reason = self.reason,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("llm_json_repair", span_name = name, operation = self.operation)
    }
}
