// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Pipeline execution: input loading, the workflow runner, checkpoints,
//! table emitters, run statistics and the callbacks that observe a run.
//!
//! A run writes everything below `<output>/<run-id>/`:
//!
//! ```text
//! <workflow>.parquet                 checkpoint, always written
//! <workflow>.json | <workflow>.csv   extra configured formats
//! <workflow>_profiling.steps.csv     with memory_profile enabled
//! stats.json                         cumulative run statistics
//! ```

mod callbacks;
mod emitters;
mod input;
mod runner;
mod stats;

#[cfg(test)]
mod integration_tests;

pub use callbacks::{NoopCallbacks, TracingCallbacks, WorkflowCallbacks};
pub use emitters::{create_emitters, StorageEmitter, TableEmitter};
pub use input::load_input;
pub use runner::{checkpoint_key, PipelineRunResult, PipelineRunner};
pub use stats::{PipelineRunStats, StepStats, WorkflowStats, STATS_FILE};
