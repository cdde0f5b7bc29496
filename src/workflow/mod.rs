// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Workflows: named, ordered lists of verb steps over tables.
//!
//! A step reads the table named by its `source` binding (a workflow
//! reference `workflow:<name>` or the root input `input`), or, without one,
//! the previous step's output. The first step of a workflow defaults to the
//! root input.

pub mod builtin;
mod registry;
mod resolver;
mod verb;
pub(crate) mod verbs;

pub use registry::{CustomVerb, VerbRegistry};
pub(crate) use resolver::materialize;
pub use resolver::resolve_workflows;
pub use verb::{
    ChunkArgs, ClusterGraphArgs, ConcatArgs, ExtractClaimsArgs, ExtractGraphArgs, GraphPart,
    MergeGraphsArgs, RenameArgs, SelectArgs, SnapshotGraphArgs, SummarizeCommunitiesArgs,
    SummarizeDescriptionsArgs, UnpackGraphArgs, Verb,
};
pub use verbs::VerbContext;

use crate::config::StepInput;

/// Name under which the root input table is bound.
pub const INPUT_TABLE: &str = "input";

/// Prefix marking a binding as the output of another workflow.
pub const WORKFLOW_PREFIX: &str = "workflow:";

/// The workflow named by a `workflow:<name>` binding.
pub fn workflow_reference(binding: &str) -> Option<&str> {
    binding.strip_prefix(WORKFLOW_PREFIX)
}

#[derive(Debug, Clone)]
pub struct Step {
    pub verb: Verb,
    pub input: StepInput,
}

impl Step {
    /// Every table binding the step reads, source first.
    pub fn bindings(&self) -> impl Iterator<Item = &String> {
        self.input.source.iter().chain(self.input.others.iter())
    }
}

#[derive(Debug, Clone)]
pub struct Workflow {
    pub name: String,
    pub steps: Vec<Step>,
}

impl Workflow {
    /// Workflows whose outputs this one reads, in first-use order.
    pub fn dependencies(&self) -> Vec<String> {
        let mut deps: Vec<String> = Vec::new();
        for binding in self.steps.iter().flat_map(Step::bindings) {
            if let Some(name) = workflow_reference(binding) {
                if !deps.iter().any(|d| d == name) {
                    deps.push(name.to_string());
                }
            }
        }
        deps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(source: Option<&str>, others: &[&str]) -> Step {
        Step {
            verb: Verb::Concat(ConcatArgs::default()),
            input: StepInput {
                source: source.map(str::to_string),
                others: others.iter().map(|o| o.to_string()).collect(),
            },
        }
    }

    #[test]
    fn test_dependencies_are_deduplicated_in_first_use_order() {
        let workflow = Workflow {
            name: "final".into(),
            steps: vec![
                step(Some("workflow:b"), &["workflow:a", "input"]),
                step(None, &["workflow:b", "workflow:c"]),
            ],
        };
        assert_eq!(workflow.dependencies(), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_workflow_reference() {
        let cases = vec![("workflow:base", Some("base")), ("input", None), ("workflow:", Some(""))];
        for (binding, expected) in cases {
            assert_eq!(workflow_reference(binding), expected, "{}", binding);
        }
    }
}
