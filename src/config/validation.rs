// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Configuration validation that runs before any workflow executes.
//!
//! [`validate_config`] checks the parsed configuration in isolation: blob
//! sections carry a container and credentials, workflow names are unique,
//! numeric settings are in range and only utf-8 input is requested.
//! Workflow dependencies are only known once built-in workflows have been
//! materialized, so cycle detection ([`find_cycle`]) is run by the resolver
//! over a [`DependencyGraph`].
//!
//! ## Cycle Detection Algorithm
//! Depth-first search with a recursion stack:
//! - **Time Complexity**: O(V + E)
//! - **Detection Method**: a neighbor already on the current path closes a cycle
//! - **Result**: the cycle path, first node repeated at the end

use crate::config::{BlobConfig, CacheConfig, DependencyGraph, PipelineConfig, StorageConfig};
use crate::errors::ValidationError;
use regex::Regex;
use std::collections::HashSet;

/// Validates `config`, collecting every problem instead of stopping at the first.
///
/// # Examples
///
/// ```rust
/// use graphrag_indexer::config::{validate_config, PipelineConfig, WorkflowReference};
///
/// let mut config = PipelineConfig::default();
/// config.workflows = vec![
///     WorkflowReference::named("create_base_text_units"),
///     WorkflowReference::named("create_base_text_units"),
/// ];
/// let errors = validate_config(&config).unwrap_err();
/// assert_eq!(errors.len(), 1);
/// ```
pub fn validate_config(config: &PipelineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_storage(&config.storage, "storage", &mut errors);
    validate_storage(&config.input.storage, "input", &mut errors);
    if let CacheConfig::Blob(blob) = &config.cache {
        validate_blob(blob, "cache", &mut errors);
    }
    validate_unique_workflow_names(config, &mut errors);
    validate_ranges(config, &mut errors);

    if let Some(encoding) = &config.input.encoding {
        if !is_utf8(encoding) {
            errors.push(ValidationError::UnsupportedEncoding {
                encoding: encoding.clone(),
            });
        }
    }
    if let Err(e) = Regex::new(config.input.pattern()) {
        errors.push(ValidationError::InvalidValue {
            field: "input.file_pattern".to_string(),
            reason: e.to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub(crate) fn is_utf8(encoding: &str) -> bool {
    matches!(
        encoding.to_ascii_lowercase().replace('_', "-").as_str(),
        "utf-8" | "utf8"
    )
}

fn validate_storage(config: &StorageConfig, section: &str, errors: &mut Vec<ValidationError>) {
    if let StorageConfig::Blob(blob) = config {
        validate_blob(blob, section, errors);
    }
}

fn validate_blob(blob: &BlobConfig, section: &str, errors: &mut Vec<ValidationError>) {
    match blob.container_name.as_deref().map(str::trim) {
        None | Some("") => errors.push(ValidationError::MissingContainerName {
            section: section.to_string(),
        }),
        Some(container) => {
            if blob.credentials().is_none() {
                errors.push(ValidationError::MissingCredentials {
                    container: container.to_string(),
                });
            }
        }
    }
}

fn validate_unique_workflow_names(config: &PipelineConfig, errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();
    for (i, workflow) in config.workflows.iter().enumerate() {
        match &workflow.name {
            Some(name) => {
                if !seen.insert(name.as_str()) {
                    errors.push(ValidationError::DuplicateWorkflow { name: name.clone() });
                }
            }
            None if workflow.steps.is_none() => errors.push(ValidationError::InvalidValue {
                field: format!("workflows[{}]", i),
                reason: "a workflow needs a name, steps, or both".to_string(),
            }),
            None => {}
        }
    }
}

fn validate_ranges(config: &PipelineConfig, errors: &mut Vec<ValidationError>) {
    let mut invalid = |field: &str, reason: &str| {
        errors.push(ValidationError::InvalidValue {
            field: field.to_string(),
            reason: reason.to_string(),
        })
    };

    if config.parallelization.num_threads == 0 {
        invalid("parallelization.num_threads", "must be at least 1");
    }
    if config.chunks.size == 0 {
        invalid("chunks.size", "must be at least 1");
    } else if config.chunks.overlap >= config.chunks.size {
        invalid("chunks.overlap", "must be smaller than chunks.size");
    }
    if config.llm.json_attempts == 0 {
        invalid("llm.json_attempts", "must be at least 1");
    }
    if config.llm.max_retry_wait < 0.0 || !config.llm.max_retry_wait.is_finite() {
        invalid("llm.max_retry_wait", "must be a non-negative number of seconds");
    }
    if config.llm.request_timeout <= 0.0 || !config.llm.request_timeout.is_finite() {
        invalid("llm.request_timeout", "must be a positive number of seconds");
    }
    if config.cluster_graph.max_cluster_size == 0 {
        invalid("cluster_graph.max_cluster_size", "must be at least 1");
    }
}

/// Finds one dependency cycle in `graph`, if any.
///
/// Nodes are visited in registration order so the reported path is stable.
pub fn find_cycle(graph: &DependencyGraph) -> Option<Vec<String>> {
    let mut visited = HashSet::new();
    let mut rec_stack = HashSet::new();
    let mut path = Vec::new();

    for name in graph.names() {
        if !visited.contains(name.as_str()) {
            if let Some(cycle) =
                dfs_cycle_detection(name, graph, &mut visited, &mut rec_stack, &mut path)
            {
                return Some(cycle);
            }
        }
    }
    None
}

fn dfs_cycle_detection(
    node: &str,
    graph: &DependencyGraph,
    visited: &mut HashSet<String>,
    rec_stack: &mut HashSet<String>,
    path: &mut Vec<String>,
) -> Option<Vec<String>> {
    visited.insert(node.to_string());
    rec_stack.insert(node.to_string());
    path.push(node.to_string());

    for neighbor in graph.dependencies(node).into_iter().flatten() {
        if !graph.contains(neighbor) {
            continue;
        }
        if !visited.contains(neighbor) {
            if let Some(cycle) = dfs_cycle_detection(neighbor, graph, visited, rec_stack, path) {
                return Some(cycle);
            }
        } else if rec_stack.contains(neighbor) {
            let cycle_start = path.iter().position(|x| x == neighbor).unwrap_or(0);
            let mut cycle = path[cycle_start..].to_vec();
            cycle.push(neighbor.clone());
            return Some(cycle);
        }
    }

    rec_stack.remove(node);
    path.pop();
    None
}
