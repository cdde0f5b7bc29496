// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The built-in indexing workflows and their step lists.
//!
//! ```text
//! input -> create_base_text_units -> create_base_extracted_entities
//!       -> create_summarized_entities -> create_base_entity_graph
//!       -> create_final_entities | create_final_relationships
//!        | create_final_communities | create_final_community_reports
//! create_base_text_units -> create_final_covariates (when claims are enabled)
//! ```

use crate::config::{PipelineConfig, StepConfig, WorkflowReference};
use serde_json::{json, Value};

pub const CREATE_BASE_TEXT_UNITS: &str = "create_base_text_units";
pub const CREATE_BASE_EXTRACTED_ENTITIES: &str = "create_base_extracted_entities";
pub const CREATE_SUMMARIZED_ENTITIES: &str = "create_summarized_entities";
pub const CREATE_BASE_ENTITY_GRAPH: &str = "create_base_entity_graph";
pub const CREATE_FINAL_ENTITIES: &str = "create_final_entities";
pub const CREATE_FINAL_RELATIONSHIPS: &str = "create_final_relationships";
pub const CREATE_FINAL_COMMUNITIES: &str = "create_final_communities";
pub const CREATE_FINAL_COMMUNITY_REPORTS: &str = "create_final_community_reports";
pub const CREATE_FINAL_COVARIATES: &str = "create_final_covariates";

const ALWAYS_RUN: &[&str] = &[
    CREATE_BASE_TEXT_UNITS,
    CREATE_BASE_EXTRACTED_ENTITIES,
    CREATE_SUMMARIZED_ENTITIES,
    CREATE_BASE_ENTITY_GRAPH,
    CREATE_FINAL_ENTITIES,
    CREATE_FINAL_RELATIONSHIPS,
    CREATE_FINAL_COMMUNITIES,
    CREATE_FINAL_COMMUNITY_REPORTS,
];

fn from(workflow: &str) -> String {
    format!("{}{}", crate::workflow::WORKFLOW_PREFIX, workflow)
}

fn step(verb: &str, args: Value) -> StepConfig {
    StepConfig::new(verb, args)
}

/// Workflows run when the configuration lists none.
pub fn default_workflows(config: &PipelineConfig) -> Vec<WorkflowReference> {
    let mut names: Vec<&str> = ALWAYS_RUN.to_vec();
    if config.claim_extraction.enabled {
        names.push(CREATE_FINAL_COVARIATES);
    }
    names.into_iter().map(WorkflowReference::named).collect()
}

/// Steps of the built-in workflow `name`, or `None` if there is no such workflow.
pub fn builtin_steps(name: &str, config: &PipelineConfig) -> Option<Vec<StepConfig>> {
    let steps = match name {
        CREATE_BASE_TEXT_UNITS => vec![step(
            "chunk",
            json!({ "size": config.chunks.size, "overlap": config.chunks.overlap }),
        )],
        CREATE_BASE_EXTRACTED_ENTITIES => vec![
            step("extract_graph", json!({})).with_source(from(CREATE_BASE_TEXT_UNITS)),
            step("merge_graphs", json!({ "group_by": "document_ids" })),
        ],
        CREATE_SUMMARIZED_ENTITIES => vec![
            step("summarize_descriptions", json!({})).with_source(from(CREATE_BASE_EXTRACTED_ENTITIES)),
        ],
        CREATE_BASE_ENTITY_GRAPH => {
            let mut steps = vec![
                step("cluster_graph", json!({})).with_source(from(CREATE_SUMMARIZED_ENTITIES)),
            ];
            if config.snapshots.graph {
                steps.push(step("snapshot_graph", json!({ "name": "clustered_graph" })));
            }
            steps
        }
        CREATE_FINAL_ENTITIES => vec![step("unpack_graph", json!({ "kind": "nodes", "level": 0 }))
            .with_source(from(CREATE_BASE_ENTITY_GRAPH))],
        CREATE_FINAL_RELATIONSHIPS => vec![step("unpack_graph", json!({ "kind": "edges", "level": 0 }))
            .with_source(from(CREATE_BASE_ENTITY_GRAPH))],
        CREATE_FINAL_COMMUNITIES => vec![step("unpack_graph", json!({ "kind": "communities" }))
            .with_source(from(CREATE_BASE_ENTITY_GRAPH))],
        CREATE_FINAL_COMMUNITY_REPORTS => vec![step("summarize_communities", json!({}))
            .with_source(from(CREATE_BASE_ENTITY_GRAPH))],
        CREATE_FINAL_COVARIATES => vec![step("extract_claims", json!({}))
            .with_source(from(CREATE_BASE_TEXT_UNITS))],
        _ => return None,
    };
    Some(steps)
}
