// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for pipeline run lifecycle events.
//!
//! This module contains message types for logging events related to:
//! * Workflow start, completion, skip (resume) and failure
//! * Step timing
//! * Per-row failures inside a step
//! * Run statistics flushes and the final run summary

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// Workflow execution started.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use graphrag_indexer::observability::messages::pipeline::WorkflowStarted;
///
/// let msg = WorkflowStarted {
///     workflow: "create_base_text_units",
///     position: 1,
///     total: 3,
/// };
///
/// assert_eq!(msg.to_string(), "Running workflow 'create_base_text_units' (1/3)");
/// ```
pub struct WorkflowStarted<'a> {
    pub workflow: &'a str,
    pub position: usize,
    pub total: usize,
}

impl Display for WorkflowStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Running workflow '{}' ({}/{})",
            self.workflow, self.position, self.total
        )
    }
}

impl StructuredLog for WorkflowStarted<'_> {
    fn log(&self) {
        tracing::info!(
            workflow = self.workflow,
            position = self.position,
            total = self.total,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "workflow",
            span_name = name,
            workflow = self.workflow,
            position = self.position,
            total = self.total,
        )
    }
}

/// Workflow completed and its checkpoint was written.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use graphrag_indexer::observability::messages::pipeline::WorkflowCompleted;
/// use std::time::Duration;
///
/// let msg = WorkflowCompleted {
///     workflow: "create_base_text_units",
///     rows: 12,
///     elapsed: Duration::from_millis(1500),
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct WorkflowCompleted<'a> {
    pub workflow: &'a str,
    pub rows: usize,
    pub elapsed: Duration,
}

impl Display for WorkflowCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Workflow '{}' completed with {} rows in {:?}",
            self.workflow, self.rows, self.elapsed
        )
    }
}

impl StructuredLog for WorkflowCompleted<'_> {
    fn log(&self) {
        tracing::info!(
            workflow = self.workflow,
            rows = self.rows,
            elapsed_ms = self.elapsed.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "workflow_completed",
            span_name = name,
            workflow = self.workflow,
            rows = self.rows,
        )
    }
}

/// Workflow skipped because its checkpoint already exists (resume mode).
///
/// # Log Level
/// `info!` - Important operational event
pub struct WorkflowSkipped<'a> {
    pub workflow: &'a str,
}

impl Display for WorkflowSkipped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Skipping workflow '{}': checkpoint already present",
            self.workflow
        )
    }
}

impl StructuredLog for WorkflowSkipped<'_> {
    fn log(&self) {
        tracing::info!(workflow = self.workflow, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("workflow_skipped", span_name = name, workflow = self.workflow)
    }
}

/// Workflow failed; the run is aborted.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct WorkflowFailed<'a> {
    pub workflow: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for WorkflowFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Workflow '{}' failed: {}", self.workflow, self.error)
    }
}

impl StructuredLog for WorkflowFailed<'_> {
    fn log(&self) {
        tracing::error!(
            workflow = self.workflow,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "workflow_failed",
            span_name = name,
            workflow = self.workflow,
            error = %self.error,
        )
    }
}

/// A single step finished.
///
/// # Log Level
/// `debug!` - Detailed diagnostic information
pub struct StepCompleted<'a> {
    pub workflow: &'a str,
    pub verb: &'a str,
    pub rows: usize,
    pub elapsed: Duration,
}

impl Display for StepCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Step '{}' of workflow '{}' produced {} rows in {:?}",
            self.verb, self.workflow, self.rows, self.elapsed
        )
    }
}

impl StructuredLog for StepCompleted<'_> {
    fn log(&self) {
        tracing::debug!(
            workflow = self.workflow,
            verb = self.verb,
            rows = self.rows,
            elapsed_ms = self.elapsed.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "step",
            span_name = name,
            workflow = self.workflow,
            verb = self.verb,
        )
    }
}

/// One row of a step failed and was skipped.
///
/// # Log Level
/// `warn!` - Potential issue or degraded behavior
pub struct RowFailed<'a> {
    pub verb: &'a str,
    pub row: usize,
    pub snippet: &'a str,
    pub error: &'a str,
}

impl Display for RowFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Row {} of step '{}' failed and was skipped: {}",
            self.row, self.verb, self.error
        )
    }
}

impl StructuredLog for RowFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            verb = self.verb,
            row = self.row,
            snippet = self.snippet,
            error = self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("row_failed", span_name = name, verb = self.verb, row = self.row)
    }
}

/// Root input documents were loaded.
///
/// # Log Level
/// `info!` - Important operational event
pub struct InputLoaded<'a> {
    pub source: &'a str,
    pub documents: usize,
    pub elapsed: Duration,
}

impl Display for InputLoaded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Loaded {} input documents from {} in {:?}",
            self.documents, self.source, self.elapsed
        )
    }
}

impl StructuredLog for InputLoaded<'_> {
    fn log(&self) {
        tracing::info!(
            source = self.source,
            documents = self.documents,
            elapsed_ms = self.elapsed.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("input", span_name = name, source = self.source)
    }
}

/// Writing `stats.json` failed; the run carries on.
///
/// # Log Level
/// `warn!` - Potential issue or degraded behavior
pub struct StatsWriteFailed<'a> {
    pub location: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for StatsWriteFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Could not write run statistics to {}: {}", self.location, self.error)
    }
}

impl StructuredLog for StatsWriteFailed<'_> {
    fn log(&self) {
        tracing::warn!(location = self.location, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("stats", span_name = name, location = self.location)
    }
}

/// Final run summary.
///
/// # Log Level
/// `info!` on success, `error!` when any workflow failed
pub struct PipelineFinished<'a> {
    pub run_id: &'a str,
    pub workflows_run: usize,
    pub workflows_skipped: usize,
    pub failed: bool,
    pub elapsed: Duration,
}

impl Display for PipelineFinished<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let status = if self.failed { "failed" } else { "succeeded" };
        write!(
            f,
            "Pipeline run '{}' {}: {} workflows run, {} skipped in {:?}",
            self.run_id, status, self.workflows_run, self.workflows_skipped, self.elapsed
        )
    }
}

impl StructuredLog for PipelineFinished<'_> {
    fn log(&self) {
        if self.failed {
            tracing::error!(
                run_id = self.run_id,
                workflows_run = self.workflows_run,
                workflows_skipped = self.workflows_skipped,
                "{}", self
            );
        } else {
            tracing::info!(
                run_id = self.run_id,
                workflows_run = self.workflows_run,
                workflows_skipped = self.workflows_skipped,
                "{}", self
            );
        }
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("pipeline", span_name = name, run_id = self.run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_finished_display() {
        let msg = PipelineFinished {
            run_id: "run-1",
            workflows_run: 2,
            workflows_skipped: 1,
            failed: true,
            elapsed: Duration::from_secs(3),
        };

        assert_eq!(
            msg.to_string(),
            "Pipeline run 'run-1' failed: 2 workflows run, 1 skipped in 3s"
        );
    }

    #[test]
    fn test_row_failed_display() {
        let msg = RowFailed {
            verb: "extract_graph",
            row: 4,
            snippet: "Alice works",
            error: "timeout",
        };

        assert_eq!(
            msg.to_string(),
            "Row 4 of step 'extract_graph' failed and was skipped: timeout"
        );
    }
}
