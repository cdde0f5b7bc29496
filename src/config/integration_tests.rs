// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::{
    load_config, parse_config, substitute_env, CacheConfig, ConfigFormat, EmitType,
    InputFileType, LlmType, StorageConfig,
};
use crate::errors::ConfigError;
use crate::row;
use crate::runtime::{NoopCallbacks, PipelineRunner};
use crate::table::Table;
use crate::workflow::{resolve_workflows, VerbRegistry};
use futures::StreamExt;
use std::sync::Arc;

/// The dry-run sample loads with every section it sets applied.
#[test]
fn test_dry_run_yaml_loading() {
    let config = load_config("configs/dry-run.yaml").unwrap();

    assert_eq!(config.run_id.as_deref(), Some("dry-run"));
    assert_eq!(
        config.storage,
        StorageConfig::File {
            base_dir: "output".into()
        }
    );
    assert_eq!(config.cache, CacheConfig::None);
    assert_eq!(config.llm.kind, LlmType::Static);
    assert_eq!(config.llm.static_responses.len(), 1);
    assert_eq!(config.emit, vec![EmitType::Parquet, EmitType::Csv]);
    assert_eq!(config.parallelization.num_threads, 2);
    assert_eq!((config.chunks.size, config.chunks.overlap), (300, 30));
    assert_eq!(config.entity_extraction.max_gleanings, 0);
    assert!(config.snapshots.graph);
    assert_eq!(config.input.pattern(), r"(?P<filename>[^/]+)\.txt$");
    assert!(config.workflows.is_empty());
}

#[test]
fn test_custom_workflows_yaml_resolves() {
    let config = load_config("configs/custom-workflows.yaml").unwrap();
    assert_eq!(config.storage, StorageConfig::Memory);
    assert_eq!(config.preprocessing.len(), 1);
    assert!(config.memory_profile);

    let workflows = resolve_workflows(&config, &VerbRegistry::new()).unwrap();
    let names: Vec<&str> = workflows.iter().map(|w| w.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["create_base_text_units", "chunk_ids", "Anonymous Workflow 1"]
    );
    // the disabled rename step is dropped
    assert_eq!(workflows[2].steps.len(), 1);
}

/// The TOML sample needs its API key from the environment.
#[test]
fn test_openai_toml_with_substituted_key() {
    let content = std::fs::read_to_string("configs/openai.toml").unwrap();

    let missing = substitute_env(&content, |_| None);
    assert!(matches!(missing, Err(ConfigError::MissingEnvVar(name)) if name == "GRAPHRAG_API_KEY"));

    let content = substitute_env(&content, |name| {
        (name == "GRAPHRAG_API_KEY").then(|| "sk-test".to_string())
    })
    .unwrap();
    let config = parse_config(&content, ConfigFormat::Toml).unwrap();

    assert_eq!(config.llm.kind, LlmType::OpenaiChat);
    assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
    assert!(config.llm.model_supports_json);
    assert_eq!(config.llm.tokens_per_minute, Some(150_000));
    assert_eq!(config.llm.max_retries, 5);
    assert_eq!(config.input.file_type, InputFileType::Csv);
    assert_eq!(config.input.title_column.as_deref(), Some("headline"));
    assert_eq!(config.input.document_attribute_columns, vec!["source"]);
    assert!(config.claim_extraction.enabled);
    assert_eq!(config.community_reports.max_input_tokens, 6000);
    assert_eq!(config.emit, vec![EmitType::Parquet, EmitType::Json]);

    let workflows = resolve_workflows(&config, &VerbRegistry::new()).unwrap();
    assert_eq!(workflows.len(), 9);
}

#[test]
fn test_missing_config_file() {
    assert!(matches!(
        load_config("configs/does-not-exist.yaml"),
        Err(ConfigError::Io { .. })
    ));
}

#[tokio::test]
async fn test_custom_workflows_yaml_runs() {
    let config = load_config("configs/custom-workflows.yaml").unwrap();
    let runner = PipelineRunner::from_config(config)
        .unwrap()
        .with_run_id("custom")
        .with_callbacks(Arc::new(NoopCallbacks));
    let input = Table::from_rows(vec![
        row! {"id" => "d1", "text" => "Alice works at Acme.", "title" => "a", "extra" => 1},
        row! {"id" => "d2", "text" => "Bob works at Acme.", "title" => "b", "extra" => 2},
    ]);

    let results: Vec<_> = runner.run_with_input(input, false).unwrap().collect().await;

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.is_success()));
    let chunk_ids = results[1].table.as_ref().unwrap();
    assert_eq!(chunk_ids.columns(), ["id", "n_tokens"]);
    assert_eq!(chunk_ids.len(), 2);
    assert_eq!(results[2].table.as_ref().map(Table::len), Some(4));
}
