// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Nested sections of the pipeline configuration file.

use crate::config::consts::{
    DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_CLUSTER_SEED, DEFAULT_ENTITY_TYPES,
    DEFAULT_MAX_CLUSTER_LEVELS, DEFAULT_MAX_CLUSTER_SIZE, DEFAULT_MAX_GLEANINGS,
    DEFAULT_NUM_THREADS, DEFAULT_REPORT_MAX_INPUT_TOKENS, DEFAULT_SUMMARY_MAX_INPUT_TOKENS,
    DEFAULT_SUMMARY_MAX_LENGTH,
};
use crate::storage::BlobCredentials;
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_true() -> bool {
    true
}

/// Where checkpoints, stats and emitted tables are written.
///
/// # Example
/// ```yaml
/// storage:
///   type: file
///   base_dir: output
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageConfig {
    Memory,
    File {
        #[serde(default = "default_output_dir")]
        base_dir: String,
    },
    Blob(BlobConfig),
}

fn default_output_dir() -> String {
    "output".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::File {
            base_dir: default_output_dir(),
        }
    }
}

impl StorageConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            StorageConfig::Memory => "memory",
            StorageConfig::File { .. } => "file",
            StorageConfig::Blob(_) => "blob",
        }
    }
}

/// Connection settings shared by blob storage and blob cache.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BlobConfig {
    pub container_name: Option<String>,
    pub connection_string: Option<String>,
    pub storage_account_blob_url: Option<String>,
    pub account_name: Option<String>,
    pub account_key: Option<String>,
    pub sas_token: Option<String>,
    pub base_dir: Option<String>,
}

impl BlobConfig {
    /// A connection string wins over an explicit account url.
    pub fn credentials(&self) -> Option<BlobCredentials> {
        let present = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());
        if let Some(connection_string) = present(&self.connection_string) {
            return Some(BlobCredentials::ConnectionString(connection_string));
        }
        present(&self.storage_account_blob_url).map(|endpoint| BlobCredentials::Endpoint {
            endpoint,
            account_name: present(&self.account_name),
            account_key: present(&self.account_key),
            sas_token: present(&self.sas_token),
        })
    }
}

/// Model response cache.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheConfig {
    None,
    Memory,
    File {
        #[serde(default = "default_cache_dir")]
        base_dir: String,
    },
    Blob(BlobConfig),
}

fn default_cache_dir() -> String {
    "cache".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig::File {
            base_dir: default_cache_dir(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmType {
    #[default]
    OpenaiChat,
    /// Answers from `static_responses`; no network access.
    Static,
}

/// Model client settings, one model identity per run.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    #[serde(rename = "type")]
    pub kind: LlmType,
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub model: String,
    pub model_supports_json: bool,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f64>,
    /// Seconds
    pub request_timeout: f64,
    pub max_retries: u32,
    /// Seconds
    pub max_retry_wait: f64,
    pub sleep_on_rate_limit_recommendation: bool,
    pub tokens_per_minute: Option<u64>,
    pub requests_per_minute: Option<u64>,
    pub concurrent_requests: Option<usize>,
    pub json_attempts: u32,
    pub static_responses: Vec<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            kind: LlmType::OpenaiChat,
            api_key: None,
            api_base: None,
            model: "gpt-4o-mini".to_string(),
            model_supports_json: false,
            temperature: 0.0,
            max_tokens: Some(4000),
            top_p: Some(1.0),
            request_timeout: 180.0,
            max_retries: 10,
            max_retry_wait: 10.0,
            sleep_on_rate_limit_recommendation: true,
            tokens_per_minute: None,
            requests_per_minute: None,
            concurrent_requests: Some(25),
            json_attempts: 3,
            static_responses: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputFileType {
    #[default]
    Text,
    Csv,
}

/// Source documents for the run.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct InputConfig {
    #[serde(rename = "type")]
    pub file_type: InputFileType,
    pub storage: StorageConfig,
    /// Regex matched against storage keys; named groups become document columns.
    pub file_pattern: Option<String>,
    pub base_dir: Option<String>,
    pub encoding: Option<String>,
    pub text_column: String,
    pub title_column: Option<String>,
    pub document_attribute_columns: Vec<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            file_type: InputFileType::Text,
            storage: StorageConfig::File {
                base_dir: "input".to_string(),
            },
            file_pattern: None,
            base_dir: None,
            encoding: None,
            text_column: "text".to_string(),
            title_column: None,
            document_attribute_columns: Vec::new(),
        }
    }
}

impl InputConfig {
    pub fn pattern(&self) -> &str {
        match (&self.file_pattern, self.file_type) {
            (Some(pattern), _) => pattern,
            (None, InputFileType::Text) => r"(?P<filename>[^/]+)\.txt$",
            (None, InputFileType::Csv) => r"(?P<filename>[^/]+)\.csv$",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmitType {
    Parquet,
    Json,
    Csv,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ParallelizationConfig {
    pub num_threads: usize,
}

impl Default for ParallelizationConfig {
    fn default() -> Self {
        Self {
            num_threads: DEFAULT_NUM_THREADS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EntityExtractionConfig {
    pub entity_types: Vec<String>,
    pub max_gleanings: u32,
    pub prompt: Option<String>,
}

impl Default for EntityExtractionConfig {
    fn default() -> Self {
        Self {
            entity_types: DEFAULT_ENTITY_TYPES.iter().map(|t| t.to_string()).collect(),
            max_gleanings: DEFAULT_MAX_GLEANINGS,
            prompt: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SummarizeDescriptionsConfig {
    pub max_length: usize,
    pub max_input_tokens: usize,
    pub prompt: Option<String>,
}

impl Default for SummarizeDescriptionsConfig {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_SUMMARY_MAX_LENGTH,
            max_input_tokens: DEFAULT_SUMMARY_MAX_INPUT_TOKENS,
            prompt: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClaimExtractionConfig {
    pub enabled: bool,
    pub description: String,
    pub max_gleanings: u32,
    pub prompt: Option<String>,
}

impl Default for ClaimExtractionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            description: "Any claims or facts that could be relevant to information discovery."
                .to_string(),
            max_gleanings: DEFAULT_MAX_GLEANINGS,
            prompt: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClusterGraphConfig {
    pub max_cluster_size: usize,
    pub max_levels: usize,
    pub use_lcc: bool,
    pub seed: u64,
}

impl Default for ClusterGraphConfig {
    fn default() -> Self {
        Self {
            max_cluster_size: DEFAULT_MAX_CLUSTER_SIZE,
            max_levels: DEFAULT_MAX_CLUSTER_LEVELS,
            use_lcc: true,
            seed: DEFAULT_CLUSTER_SEED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CommunityReportsConfig {
    pub max_input_tokens: usize,
    pub prompt: Option<String>,
}

impl Default for CommunityReportsConfig {
    fn default() -> Self {
        Self {
            max_input_tokens: DEFAULT_REPORT_MAX_INPUT_TOKENS,
            prompt: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SnapshotsConfig {
    /// Write the clustered graph as `clustered_graph.json`.
    pub graph: bool,
}

/// Table bindings of a step; names may be `input` or `workflow:<name>`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StepInput {
    pub source: Option<String>,
    pub others: Vec<String>,
}

/// A step as written in configuration; the verb is resolved later.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StepConfig {
    pub verb: String,
    #[serde(default)]
    pub args: Value,
    #[serde(default)]
    pub input: Option<StepInput>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl StepConfig {
    pub fn new(verb: impl Into<String>, args: Value) -> Self {
        Self {
            verb: verb.into(),
            args,
            input: None,
            enabled: true,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.input.get_or_insert_with(StepInput::default).source = Some(source.into());
        self
    }

    pub fn with_others(mut self, others: Vec<String>) -> Self {
        self.input.get_or_insert_with(StepInput::default).others = others;
        self
    }
}

/// A workflow to run: a built-in by name, or explicit steps.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct WorkflowReference {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub steps: Option<Vec<StepConfig>>,
}

impl WorkflowReference {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            steps: None,
        }
    }

    pub fn with_steps(name: impl Into<String>, steps: Vec<StepConfig>) -> Self {
        Self {
            name: Some(name.into()),
            steps: Some(steps),
        }
    }
}
