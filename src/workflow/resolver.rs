// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::{DependencyGraph, PipelineConfig, StepConfig, WorkflowReference};
use crate::errors::ValidationError;
use crate::observability::messages::validation::{
    CyclicDependencyDetected, UnknownWorkflowReference, WorkflowsResolved,
};
use crate::observability::messages::StructuredLog;
use crate::workflow::builtin::{builtin_steps, default_workflows};
use crate::workflow::{Step, Verb, VerbRegistry, Workflow};
use std::collections::{HashMap, VecDeque};

/// Builds a workflow from configured steps, dropping disabled ones.
pub(crate) fn materialize(
    name: String,
    steps: &[StepConfig],
    registry: &VerbRegistry,
) -> Result<Workflow, ValidationError> {
    let steps = steps
        .iter()
        .filter(|s| s.enabled)
        .map(|s| {
            Ok(Step {
                verb: Verb::from_config(s, &name, registry)?,
                input: s.input.clone().unwrap_or_default(),
            })
        })
        .collect::<Result<Vec<_>, ValidationError>>()?;
    Ok(Workflow { name, steps })
}

/// Turns the configured workflow references into workflows in run order.
///
/// With no references configured the built-in defaults are used. A
/// reference without steps must name a built-in workflow; a reference
/// without a name becomes `Anonymous Workflow N`. Any `workflow:<name>`
/// binding pulls in the named built-in when it is not configured. Unknown
/// verbs, unknown workflows, duplicate names and dependency cycles are all
/// reported before anything runs.
pub fn resolve_workflows(
    config: &PipelineConfig,
    registry: &VerbRegistry,
) -> Result<Vec<Workflow>, ValidationError> {
    let references: Vec<WorkflowReference> = if config.workflows.is_empty() {
        default_workflows(config)
    } else {
        config.workflows.clone()
    };

    let mut workflows: Vec<Workflow> = Vec::new();
    let mut anonymous = 0;
    for reference in references {
        let name = match reference.name {
            Some(name) => name,
            None => {
                anonymous += 1;
                format!("Anonymous Workflow {}", anonymous)
            }
        };
        if workflows.iter().any(|w| w.name == name) {
            return Err(ValidationError::DuplicateWorkflow { name });
        }
        let steps = match reference.steps {
            Some(steps) => steps,
            None => builtin_steps(&name, config).ok_or_else(|| ValidationError::UnknownWorkflow {
                name: name.clone(),
                referenced_by: None,
            })?,
        };
        workflows.push(materialize(name, &steps, registry)?);
    }

    let mut pending: VecDeque<usize> = (0..workflows.len()).collect();
    while let Some(position) = pending.pop_front() {
        let parent = workflows[position].name.clone();
        for dependency in workflows[position].dependencies() {
            if workflows.iter().any(|w| w.name == dependency) {
                continue;
            }
            let Some(steps) = builtin_steps(&dependency, config) else {
                UnknownWorkflowReference {
                    workflow: &parent,
                    missing: &dependency,
                }
                .log();
                return Err(ValidationError::UnknownWorkflow {
                    name: dependency,
                    referenced_by: Some(parent),
                });
            };
            workflows.push(materialize(dependency, &steps, registry)?);
            pending.push_back(workflows.len() - 1);
        }
    }

    let mut graph = DependencyGraph::new();
    for workflow in &workflows {
        graph.add_workflow(workflow.name.clone(), workflow.dependencies());
    }
    let order = graph.topological_order().inspect_err(|e| {
        if let ValidationError::CyclicDependency { cycle } = e {
            let cycle: Vec<&str> = cycle.iter().map(String::as_str).collect();
            CyclicDependencyDetected { cycle: &cycle }.log();
        }
    })?;
    WorkflowsResolved { order: &order }.log();

    let mut by_name: HashMap<String, Workflow> =
        workflows.into_iter().map(|w| (w.name.clone(), w)).collect();
    Ok(order
        .into_iter()
        .filter_map(|name| by_name.remove(&name))
        .collect())
}
