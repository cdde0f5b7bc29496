// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! Message types follow a struct-based pattern with a `Display` implementation
//! and a [`messages::StructuredLog`] implementation so every event carries the
//! same human readable text and the same structured fields wherever it is logged.
//!
//! # Architecture
//!
//! Messages are organized by subsystem:
//! * `messages::pipeline` - workflow lifecycle, resume and statistics events
//! * `messages::llm` - model client retries, cache hits and output repair
//! * `messages::storage` - storage and cache backend events
//! * `messages::validation` - configuration validation failures
//!
//! # Usage
//!
//! ```rust
//! use graphrag_indexer::observability::messages::pipeline::WorkflowStarted;
//! use graphrag_indexer::observability::messages::StructuredLog;
//!
//! let msg = WorkflowStarted {
//!     workflow: "create_base_text_units",
//!     position: 1,
//!     total: 4,
//! };
//!
//! msg.log();
//! ```

pub mod messages;

use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `verbose` selects `debug` over `info`.
/// Calling this more than once is harmless, later calls are ignored.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
