// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for configuration validation errors.
//!
//! This module contains message types for logging events related to:
//! * Cyclic workflow dependency detection
//! * Unknown workflow references
//! * Validation summary

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Cyclic dependency detected between workflows.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use graphrag_indexer::observability::messages::validation::CyclicDependencyDetected;
///
/// let cycle = vec!["a", "b", "a"];
/// let msg = CyclicDependencyDetected {
///     cycle: &cycle,
/// };
///
/// tracing::error!("{}", msg);
/// ```
pub struct CyclicDependencyDetected<'a> {
    pub cycle: &'a [&'a str],
}

impl Display for CyclicDependencyDetected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Cyclic dependency detected: {}", self.cycle.join(" -> "))
    }
}

impl StructuredLog for CyclicDependencyDetected<'_> {
    fn log(&self) {
        tracing::error!(
            cycle = self.cycle.join(" -> "),
            cycle_length = self.cycle.len(),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::ERROR,
            "span_name",
            name = name,
            cycle = self.cycle.join(" -> "),
            cycle_length = self.cycle.len(),
        )
    }
}

/// A workflow reference could not be resolved.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use graphrag_indexer::observability::messages::validation::UnknownWorkflowReference;
///
/// let msg = UnknownWorkflowReference {
///     workflow: "create_final_entities",
///     missing: "create_base_entity_graph",
/// };
///
/// tracing::error!("{}", msg);
/// ```
pub struct UnknownWorkflowReference<'a> {
    pub workflow: &'a str,
    pub missing: &'a str,
}

impl Display for UnknownWorkflowReference<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Workflow '{}' references unknown workflow '{}'",
            self.workflow, self.missing
        )
    }
}

impl StructuredLog for UnknownWorkflowReference<'_> {
    fn log(&self) {
        tracing::error!(workflow = self.workflow, missing = self.missing, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::span!(
            tracing::Level::ERROR,
            "span_name",
            name = name,
            workflow = self.workflow,
            missing = self.missing,
        )
    }
}

/// Workflows resolved into a run order.
///
/// # Log Level
/// `info!` - Important operational event
pub struct WorkflowsResolved<'a> {
    pub order: &'a [String],
}

impl Display for WorkflowsResolved<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Resolved {} workflows: {}",
            self.order.len(),
            self.order.join(", ")
        )
    }
}

impl StructuredLog for WorkflowsResolved<'_> {
    fn log(&self) {
        tracing::info!(workflow_count = self.order.len(), "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("resolve", span_name = name, workflow_count = self.order.len())
    }
}

/// Configuration validation failed with one or more errors.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct ValidationFailed {
    pub error_count: usize,
}

impl Display for ValidationFailed {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Configuration validation failed with {} error(s)",
            self.error_count
        )
    }
}

impl StructuredLog for ValidationFailed {
    fn log(&self) {
        tracing::error!(error_count = self.error_count, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("config_invalid", span_name = name, error_count = self.error_count)
    }
}
