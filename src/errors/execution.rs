// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors raised while running workflows.

use crate::errors::{CacheError, ConfigError, LlmError, StorageError, TableError, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("workflow '{workflow}' has no input table named '{name}'")]
    MissingInput { workflow: String, name: String },

    #[error("step '{verb}' in workflow '{workflow}' failed: {reason}")]
    StepFailed {
        workflow: String,
        verb: String,
        reason: String,
    },

    #[error("invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("pipeline run was cancelled")]
    Cancelled,
}

impl ExecutionError {
    pub fn step_failed(
        workflow: impl Into<String>,
        verb: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ExecutionError::StepFailed {
            workflow: workflow.into(),
            verb: verb.into(),
            reason: reason.into(),
        }
    }
}
