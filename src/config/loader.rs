// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::{
    validate_config, CacheConfig, ChunkingConfig, ClaimExtractionConfig, ClusterGraphConfig,
    CommunityReportsConfig, EmitType, EntityExtractionConfig, InputConfig, LlmConfig,
    ParallelizationConfig, SnapshotsConfig, StepConfig, StorageConfig,
    SummarizeDescriptionsConfig, WorkflowReference,
};
use crate::errors::ConfigError;
use crate::observability::messages::validation::ValidationFailed;
use crate::observability::messages::StructuredLog;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

/// Complete configuration for one indexing run.
///
/// Every section is optional and falls back to its defaults. When
/// `workflows` is empty the standard indexing workflows run.
///
/// # Example
/// ```yaml
/// storage:
///   type: file
///   base_dir: output
/// cache:
///   type: file
///   base_dir: cache
/// llm:
///   type: openai_chat
///   api_key: ${GRAPHRAG_API_KEY}
///   model: gpt-4o-mini
///   tokens_per_minute: 150000
///   requests_per_minute: 500
/// input:
///   type: text
///   base_dir: input
/// emit: [parquet, csv]
/// workflows:
///   - name: create_base_text_units
///   - name: word_counts
///     steps:
///       - verb: count_words
///         input: { source: "workflow:create_base_text_units" }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Names the run's storage namespace; generated when absent.
    pub run_id: Option<String>,
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub input: InputConfig,
    pub llm: LlmConfig,
    pub emit: Vec<EmitType>,
    pub parallelization: ParallelizationConfig,
    pub chunks: ChunkingConfig,
    pub entity_extraction: EntityExtractionConfig,
    pub summarize_descriptions: SummarizeDescriptionsConfig,
    pub claim_extraction: ClaimExtractionConfig,
    pub cluster_graph: ClusterGraphConfig,
    pub community_reports: CommunityReportsConfig,
    pub snapshots: SnapshotsConfig,
    /// Write per-step profiling tables next to the checkpoints.
    pub memory_profile: bool,
    /// Steps applied once to the root input before any workflow.
    pub preprocessing: Vec<StepConfig>,
    pub workflows: Vec<WorkflowReference>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            run_id: None,
            storage: StorageConfig::default(),
            cache: CacheConfig::default(),
            input: InputConfig::default(),
            llm: LlmConfig::default(),
            emit: vec![EmitType::Parquet],
            parallelization: ParallelizationConfig::default(),
            chunks: ChunkingConfig::default(),
            entity_extraction: EntityExtractionConfig::default(),
            summarize_descriptions: SummarizeDescriptionsConfig::default(),
            claim_extraction: ClaimExtractionConfig::default(),
            cluster_graph: ClusterGraphConfig::default(),
            community_reports: CommunityReportsConfig::default(),
            snapshots: SnapshotsConfig::default(),
            memory_profile: false,
            preprocessing: Vec::new(),
            workflows: Vec::new(),
        }
    }
}

/// Serialization format of a configuration document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// `.toml` files are TOML; everything else is read as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Yaml,
        }
    }
}

/// Loads, substitutes environment variables into, and validates a config file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_config(&content, ConfigFormat::from_path(path))
}

/// Parses and validates a configuration document.
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<PipelineConfig, ConfigError> {
    let content = substitute_env(content, |name| std::env::var(name).ok())?;
    let config: PipelineConfig = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(&content)?,
        ConfigFormat::Toml => toml::from_str(&content)?,
    };
    if let Err(errors) = validate_config(&config) {
        ValidationFailed {
            error_count: errors.len(),
        }
        .log();
        return Err(ConfigError::Invalid(errors));
    }
    Ok(config)
}

/// Replaces every `${NAME}` with `lookup(NAME)`; a missing variable is an error.
pub fn substitute_env<F>(content: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let Some(pattern) = PATTERN
        .get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").ok())
        .as_ref()
    else {
        return Ok(content.to_string());
    };

    let mut missing = None;
    let substituted = pattern.replace_all(content, |caps: &Captures| {
        let name = &caps[1];
        match lookup(name) {
            Some(value) => value,
            None => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(name) => Err(ConfigError::MissingEnvVar(name)),
        None => Ok(substituted.into_owned()),
    }
}
