// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::observability::messages::pipeline::{
    StepCompleted, WorkflowCompleted, WorkflowFailed, WorkflowSkipped, WorkflowStarted,
};
use crate::observability::messages::StructuredLog;
use std::time::Duration;

/// Observer of a pipeline run. Every method defaults to doing nothing.
pub trait WorkflowCallbacks: Send + Sync {
    fn workflow_start(&self, _name: &str, _position: usize, _total: usize) {}

    fn workflow_end(&self, _name: &str, _rows: usize, _elapsed: Duration) {}

    fn workflow_skipped(&self, _name: &str) {}

    fn step_end(&self, _workflow: &str, _verb: &str, _rows: usize, _elapsed: Duration) {}

    /// A failure. `workflow` failures end the run; row failures inside a
    /// step (with `row` set) are skipped.
    fn error(&self, _workflow: &str, _row: Option<usize>, _error: &dyn std::error::Error) {}

    fn warning(&self, _message: &str) {}
}

pub struct NoopCallbacks;

impl WorkflowCallbacks for NoopCallbacks {}

/// Logs every event through `tracing`.
pub struct TracingCallbacks;

impl WorkflowCallbacks for TracingCallbacks {
    fn workflow_start(&self, name: &str, position: usize, total: usize) {
        WorkflowStarted {
            workflow: name,
            position,
            total,
        }
        .log();
    }

    fn workflow_end(&self, name: &str, rows: usize, elapsed: Duration) {
        WorkflowCompleted {
            workflow: name,
            rows,
            elapsed,
        }
        .log();
    }

    fn workflow_skipped(&self, name: &str) {
        WorkflowSkipped { workflow: name }.log();
    }

    fn step_end(&self, workflow: &str, verb: &str, rows: usize, elapsed: Duration) {
        StepCompleted {
            workflow,
            verb,
            rows,
            elapsed,
        }
        .log();
    }

    fn error(&self, workflow: &str, row: Option<usize>, error: &dyn std::error::Error) {
        if row.is_none() {
            WorkflowFailed { workflow, error }.log();
        }
    }

    fn warning(&self, message: &str) {
        tracing::warn!("{}", message);
    }
}
