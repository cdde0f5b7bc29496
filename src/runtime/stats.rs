// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::ExecutionError;
use crate::observability::messages::pipeline::StatsWriteFailed;
use crate::observability::messages::StructuredLog;
use crate::storage::PipelineStorage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const STATS_FILE: &str = "stats.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepStats {
    pub verb: String,
    /// Seconds.
    pub runtime: f64,
    pub rows: usize,
    pub approx_bytes: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowStats {
    /// Seconds, including checkpointing and emission.
    pub overall: f64,
    pub rows: usize,
    pub approx_bytes: usize,
    pub steps: Vec<StepStats>,
}

/// Cumulative statistics of a run, persisted as `stats.json`.
///
/// A resumed run starts from the statistics the earlier attempt left behind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineRunStats {
    /// Seconds.
    pub total_runtime: f64,
    pub num_documents: usize,
    /// Seconds.
    pub input_load_time: f64,
    pub workflows: BTreeMap<String, WorkflowStats>,
}

impl PipelineRunStats {
    /// The statistics stored in `storage`, if any.
    pub async fn load(storage: &dyn PipelineStorage) -> Result<Option<Self>, ExecutionError> {
        match storage.get_text(STATS_FILE, None).await? {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    pub async fn save(&self, storage: &dyn PipelineStorage) -> Result<(), ExecutionError> {
        let text = serde_json::to_string_pretty(self)?;
        storage.set_text(STATS_FILE, &text, None).await?;
        Ok(())
    }

    /// Saves, logging instead of failing; a stats write never ends a run.
    pub(crate) async fn flush(&self, storage: &dyn PipelineStorage) {
        if let Err(error) = self.save(storage).await {
            let location = storage.describe();
            StatsWriteFailed {
                location: &location,
                error: &error,
            }
            .log();
        }
    }
}
