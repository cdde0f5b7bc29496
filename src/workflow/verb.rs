// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::StepConfig;
use crate::errors::ValidationError;
use crate::graph::DescriptionMerge;
use crate::workflow::VerbRegistry;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

fn text_column() -> String {
    "text".to_string()
}

fn id_column() -> String {
    "id".to_string()
}

fn graph_column() -> String {
    "entity_graph".to_string()
}

fn clustered_column() -> String {
    "clustered_graph".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SelectArgs {
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RenameArgs {
    /// Old column name to new column name.
    pub columns: BTreeMap<String, String>,
}

/// Stacks the source table and every `others` table.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ConcatArgs {}

/// Splits documents into overlapping chunks.
///
/// Output rows carry `id` (SHA-256 of the chunk text), `text`,
/// `document_ids` and `n_tokens`; identical chunks from different
/// documents share one row.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ChunkArgs {
    pub column: String,
    pub id_column: String,
    pub size: Option<usize>,
    pub overlap: Option<usize>,
}

impl Default for ChunkArgs {
    fn default() -> Self {
        Self {
            column: text_column(),
            id_column: id_column(),
            size: None,
            overlap: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractGraphArgs {
    pub text_column: String,
    pub id_column: String,
    pub to: String,
    pub entity_types: Option<Vec<String>>,
    pub max_gleanings: Option<u32>,
    pub prompt: Option<String>,
}

impl Default for ExtractGraphArgs {
    fn default() -> Self {
        Self {
            text_column: text_column(),
            id_column: id_column(),
            to: graph_column(),
            entity_types: None,
            max_gleanings: None,
            prompt: None,
        }
    }
}

/// Merges the graphs of every row into one; with `group_by`, rows are first
/// merged per (first) group value, then the groups are merged.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MergeGraphsArgs {
    pub column: String,
    pub to: String,
    pub strategy: DescriptionMerge,
    pub group_by: Option<String>,
}

impl Default for MergeGraphsArgs {
    fn default() -> Self {
        Self {
            column: graph_column(),
            to: graph_column(),
            strategy: DescriptionMerge::default(),
            group_by: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SummarizeDescriptionsArgs {
    pub column: String,
    pub to: String,
    pub max_length: Option<usize>,
    pub max_input_tokens: Option<u64>,
    pub prompt: Option<String>,
}

impl Default for SummarizeDescriptionsArgs {
    fn default() -> Self {
        Self {
            column: graph_column(),
            to: graph_column(),
            max_length: None,
            max_input_tokens: None,
            prompt: None,
        }
    }
}

/// Produces one row per clustering level: `level` and the annotated graph.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClusterGraphArgs {
    pub column: String,
    pub to: String,
    pub level_to: String,
    pub max_cluster_size: Option<usize>,
    pub max_levels: Option<usize>,
    pub use_lcc: Option<bool>,
    pub seed: Option<u64>,
}

impl Default for ClusterGraphArgs {
    fn default() -> Self {
        Self {
            column: graph_column(),
            to: clustered_column(),
            level_to: "level".to_string(),
            max_cluster_size: None,
            max_levels: None,
            use_lcc: None,
            seed: None,
        }
    }
}

/// Writes the graph of the first row to `<name>.json`; the table passes through.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SnapshotGraphArgs {
    pub column: String,
    pub name: String,
}

impl Default for SnapshotGraphArgs {
    fn default() -> Self {
        Self {
            column: clustered_column(),
            name: "graph".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphPart {
    #[default]
    Nodes,
    Edges,
    Communities,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct UnpackGraphArgs {
    pub column: String,
    pub kind: GraphPart,
    /// Only rows of this clustering level; all levels when absent.
    pub level: Option<usize>,
}

impl Default for UnpackGraphArgs {
    fn default() -> Self {
        Self {
            column: clustered_column(),
            kind: GraphPart::default(),
            level: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractClaimsArgs {
    pub text_column: String,
    pub id_column: String,
    pub entity_specs: Option<Vec<String>>,
    pub description: Option<String>,
    pub max_gleanings: Option<u32>,
    pub prompt: Option<String>,
}

impl Default for ExtractClaimsArgs {
    fn default() -> Self {
        Self {
            text_column: text_column(),
            id_column: id_column(),
            entity_specs: None,
            description: None,
            max_gleanings: None,
            prompt: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SummarizeCommunitiesArgs {
    pub column: String,
    pub max_input_tokens: Option<usize>,
    pub prompt: Option<String>,
}

impl Default for SummarizeCommunitiesArgs {
    fn default() -> Self {
        Self {
            column: clustered_column(),
            max_input_tokens: None,
            prompt: None,
        }
    }
}

/// Every operation a step can perform. Built-in verbs carry typed
/// arguments; anything else is looked up in the [`VerbRegistry`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "verb", content = "args", rename_all = "snake_case")]
pub enum Verb {
    Select(SelectArgs),
    Rename(RenameArgs),
    Concat(ConcatArgs),
    Chunk(ChunkArgs),
    ExtractGraph(ExtractGraphArgs),
    MergeGraphs(MergeGraphsArgs),
    SummarizeDescriptions(SummarizeDescriptionsArgs),
    ClusterGraph(ClusterGraphArgs),
    SnapshotGraph(SnapshotGraphArgs),
    UnpackGraph(UnpackGraphArgs),
    ExtractClaims(ExtractClaimsArgs),
    SummarizeCommunities(SummarizeCommunitiesArgs),
    #[serde(skip)]
    Custom { name: String, args: Value },
}

const BUILTIN_VERBS: &[&str] = &[
    "select",
    "rename",
    "concat",
    "chunk",
    "extract_graph",
    "merge_graphs",
    "summarize_descriptions",
    "cluster_graph",
    "snapshot_graph",
    "unpack_graph",
    "extract_claims",
    "summarize_communities",
];

impl Verb {
    /// Parses a configured step's verb and arguments.
    ///
    /// Names that are not built in must be registered in `registry`.
    pub fn from_config(
        step: &StepConfig,
        workflow: &str,
        registry: &VerbRegistry,
    ) -> Result<Verb, ValidationError> {
        if !BUILTIN_VERBS.contains(&step.verb.as_str()) {
            if registry.contains(&step.verb) {
                return Ok(Verb::Custom {
                    name: step.verb.clone(),
                    args: step.args.clone(),
                });
            }
            return Err(ValidationError::UnknownVerb {
                workflow: workflow.to_string(),
                verb: step.verb.clone(),
            });
        }

        let args = match &step.args {
            Value::Null => Value::Object(Map::new()),
            other => other.clone(),
        };
        serde_json::from_value(json!({ "verb": step.verb, "args": args })).map_err(|e| {
            ValidationError::InvalidValue {
                field: format!("workflows.{}.{}.args", workflow, step.verb),
                reason: e.to_string(),
            }
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Verb::Select(_) => "select",
            Verb::Rename(_) => "rename",
            Verb::Concat(_) => "concat",
            Verb::Chunk(_) => "chunk",
            Verb::ExtractGraph(_) => "extract_graph",
            Verb::MergeGraphs(_) => "merge_graphs",
            Verb::SummarizeDescriptions(_) => "summarize_descriptions",
            Verb::ClusterGraph(_) => "cluster_graph",
            Verb::SnapshotGraph(_) => "snapshot_graph",
            Verb::UnpackGraph(_) => "unpack_graph",
            Verb::ExtractClaims(_) => "extract_claims",
            Verb::SummarizeCommunities(_) => "summarize_communities",
            Verb::Custom { name, .. } => name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ExecutionError;
    use crate::table::Table;
    use crate::workflow::{CustomVerb, VerbContext};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Passthrough;

    #[async_trait]
    impl CustomVerb for Passthrough {
        async fn execute(
            &self,
            _ctx: &VerbContext<'_>,
            input: Table,
            _others: Vec<Table>,
            _args: &Value,
        ) -> Result<Table, ExecutionError> {
            Ok(input)
        }
    }

    #[test]
    fn test_builtin_verbs_parse_with_defaults() {
        let registry = VerbRegistry::new();
        let cases = vec![
            (
                StepConfig::new("select", json!({"columns": ["id"]})),
                Verb::Select(SelectArgs {
                    columns: vec!["id".into()],
                }),
            ),
            (StepConfig::new("chunk", Value::Null), Verb::Chunk(ChunkArgs::default())),
            (
                StepConfig::new("unpack_graph", json!({"kind": "edges", "level": 0})),
                Verb::UnpackGraph(UnpackGraphArgs {
                    kind: GraphPart::Edges,
                    level: Some(0),
                    ..UnpackGraphArgs::default()
                }),
            ),
            (
                StepConfig::new("merge_graphs", json!({"strategy": "longest"})),
                Verb::MergeGraphs(MergeGraphsArgs {
                    strategy: DescriptionMerge::Longest,
                    ..MergeGraphsArgs::default()
                }),
            ),
        ];
        for (step, expected) in cases {
            assert_eq!(Verb::from_config(&step, "wf", &registry).unwrap(), expected);
        }
    }

    #[test]
    fn test_unknown_and_custom_verbs() {
        let mut registry = VerbRegistry::new();
        let step = StepConfig::new("shout", json!({"volume": 11}));

        assert_eq!(
            Verb::from_config(&step, "wf", &registry).unwrap_err(),
            ValidationError::UnknownVerb {
                workflow: "wf".into(),
                verb: "shout".into(),
            }
        );

        registry.register("shout", Arc::new(Passthrough));
        let verb = Verb::from_config(&step, "wf", &registry).unwrap();
        assert_eq!(verb.name(), "shout");
    }

    #[test]
    fn test_badly_typed_arguments_are_rejected() {
        let step = StepConfig::new("select", json!({"columns": "id"}));
        let err = Verb::from_config(&step, "wf", &VerbRegistry::new()).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { .. }));
    }
}
