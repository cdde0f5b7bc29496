// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod dependency_graph;
mod loader;
mod sections;
mod validation;

#[cfg(test)]
mod integration_tests;
pub mod consts;

pub use dependency_graph::DependencyGraph;
pub use loader::{load_config, parse_config, substitute_env, ConfigFormat, PipelineConfig};
pub use sections::{
    BlobConfig, CacheConfig, ChunkingConfig, ClaimExtractionConfig, ClusterGraphConfig,
    CommunityReportsConfig, EmitType, EntityExtractionConfig, InputConfig, InputFileType,
    LlmConfig, LlmType, ParallelizationConfig, SnapshotsConfig, StepConfig, StepInput,
    StorageConfig, SummarizeDescriptionsConfig, WorkflowReference,
};
pub(crate) use validation::is_utf8;
pub use validation::{find_cycle, validate_config};
