// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod cache;
mod config;
mod execution;
mod llm;
mod storage;
mod table;

pub use cache::CacheError;
pub use config::{ConfigError, ValidationError};
pub use execution::ExecutionError;
pub use llm::LlmError;
pub use storage::StorageError;
pub use table::TableError;
