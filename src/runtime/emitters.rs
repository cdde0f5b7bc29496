// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Writers for the table each workflow produces.

use crate::config::EmitType;
use crate::errors::ExecutionError;
use crate::storage::PipelineStorage;
use crate::table::{csv, jsonl, parquet, Table};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait TableEmitter: Send + Sync {
    /// Writes `table` as the output of workflow `name`.
    async fn emit(&self, name: &str, table: &Table) -> Result<(), ExecutionError>;
}

/// Writes `<name>.<extension>` with one of the table codecs.
pub struct StorageEmitter {
    storage: Arc<dyn PipelineStorage>,
    kind: EmitType,
}

impl StorageEmitter {
    pub fn new(storage: Arc<dyn PipelineStorage>, kind: EmitType) -> Self {
        Self { storage, kind }
    }

    pub fn key(&self, name: &str) -> String {
        format!("{}.{}", name, extension(self.kind))
    }
}

pub fn extension(kind: EmitType) -> &'static str {
    match kind {
        EmitType::Parquet => "parquet",
        EmitType::Json => "json",
        EmitType::Csv => "csv",
    }
}

#[async_trait]
impl TableEmitter for StorageEmitter {
    async fn emit(&self, name: &str, table: &Table) -> Result<(), ExecutionError> {
        let bytes = match self.kind {
            EmitType::Parquet => parquet::encode(table)?,
            EmitType::Json => jsonl::encode(table)?,
            EmitType::Csv => csv::encode(table)?,
        };
        self.storage.set(&self.key(name), &bytes).await?;
        Ok(())
    }
}

/// One emitter per configured type. Parquet is always first, as the
/// checkpoint later runs resume from.
pub fn create_emitters(
    kinds: &[EmitType],
    storage: &Arc<dyn PipelineStorage>,
) -> Vec<Box<dyn TableEmitter>> {
    let mut ordered = vec![EmitType::Parquet];
    for kind in kinds {
        if !ordered.contains(kind) {
            ordered.push(*kind);
        }
    }
    ordered
        .into_iter()
        .map(|kind| Box::new(StorageEmitter::new(Arc::clone(storage), kind)) as Box<dyn TableEmitter>)
        .collect()
}
