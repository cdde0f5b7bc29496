// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message type implements `Display` for consistent human readable output
//! and [`StructuredLog`] to emit the same event with structured fields.
//!
//! # Organization
//!
//! * `pipeline` - Workflow lifecycle and run statistics
//! * `llm` - Model client invocation events
//! * `storage` - Storage and cache backend events
//! * `validation` - Configuration validation errors
//!
//! # Usage Pattern
//!
//! ```rust
//! use graphrag_indexer::observability::messages::pipeline::WorkflowSkipped;
//!
//! let msg = WorkflowSkipped {
//!     workflow: "create_final_entities",
//! };
//!
//! tracing::info!("{}", msg);
//! ```

pub mod llm;
pub mod pipeline;
pub mod storage;
pub mod validation;

use tracing::Span;

/// A message that knows its own log level and structured fields.
pub trait StructuredLog {
    /// Emit the event at the message's level.
    fn log(&self);

    /// Open a span carrying the message's fields.
    fn span(&self, name: &str) -> Span;
}
