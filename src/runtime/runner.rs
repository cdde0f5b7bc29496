// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::cache::{create_cache, PipelineCache};
use crate::config::PipelineConfig;
use crate::errors::ExecutionError;
use crate::llm::{build_llm, CompletionLlm, LlmServices};
use crate::observability::messages::pipeline::{PipelineFinished, WorkflowStarted};
use crate::observability::messages::StructuredLog;
use crate::runtime::emitters::{create_emitters, extension};
use crate::runtime::input::load_input;
use crate::runtime::stats::{PipelineRunStats, StepStats, WorkflowStats};
use crate::runtime::{TracingCallbacks, WorkflowCallbacks};
use crate::storage::{create_storage, PipelineStorage};
use crate::table::{csv, parquet, Row, Table};
use crate::workflow::verbs::{self, VerbContext};
use crate::workflow::{
    materialize, resolve_workflows, workflow_reference, VerbRegistry, Workflow, INPUT_TABLE,
    WORKFLOW_PREFIX,
};
use futures::Stream;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

const PREPROCESSING: &str = "preprocessing";
const INPUT_STAGE: &str = "input";

/// Outcome of one workflow, or of the stage that ended the run.
#[derive(Debug)]
pub struct PipelineRunResult {
    pub workflow: String,
    /// The workflow's output; absent when it failed.
    pub table: Option<Table>,
    pub errors: Vec<ExecutionError>,
}

impl PipelineRunResult {
    fn success(workflow: &str, table: Table) -> Self {
        Self {
            workflow: workflow.to_string(),
            table: Some(table),
            errors: Vec::new(),
        }
    }

    fn failure(workflow: &str, error: ExecutionError) -> Self {
        Self {
            workflow: workflow.to_string(),
            table: None,
            errors: vec![error],
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Key of the checkpoint a workflow leaves in run storage.
pub fn checkpoint_key(workflow: &str) -> String {
    format!("{}.{}", workflow, extension(crate::config::EmitType::Parquet))
}

fn profile_key(workflow: &str) -> String {
    format!("{}_profiling.steps.csv", workflow)
}

fn generate_run_id() -> String {
    chrono::Local::now().format("%Y%m%d-%H%M%S").to_string()
}

/// Runs resolved workflows in order against one run's storage namespace.
///
/// Each workflow reads the root input and the checkpoints of the workflows
/// it depends on, runs its steps, and writes `<name>.parquet` plus any other
/// configured formats. With `resume`, workflows whose checkpoint already
/// exists are skipped. The first workflow failure ends the run.
pub struct PipelineRunner {
    config: PipelineConfig,
    run_id: String,
    storage: Arc<dyn PipelineStorage>,
    cache: Arc<dyn PipelineCache>,
    registry: VerbRegistry,
    callbacks: Arc<dyn WorkflowCallbacks>,
    llm: Option<Arc<dyn CompletionLlm>>,
    cancel: CancellationToken,
}

impl PipelineRunner {
    /// `storage` is the output root; the run writes below `<run-id>/`.
    pub fn new(
        config: PipelineConfig,
        storage: Arc<dyn PipelineStorage>,
        cache: Arc<dyn PipelineCache>,
    ) -> Self {
        let run_id = config.run_id.clone().unwrap_or_else(generate_run_id);
        Self {
            config,
            run_id,
            storage,
            cache,
            registry: VerbRegistry::new(),
            callbacks: Arc::new(TracingCallbacks),
            llm: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Builds output storage and cache from the configuration.
    pub fn from_config(config: PipelineConfig) -> Result<Self, ExecutionError> {
        let storage = create_storage(&config.storage)?;
        let cache = create_cache(&config.cache)?;
        Ok(Self::new(config, storage, cache))
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn with_registry(mut self, registry: VerbRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_callbacks(mut self, callbacks: Arc<dyn WorkflowCallbacks>) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Uses `llm` instead of building a client from `config.llm`.
    pub fn with_llm(mut self, llm: Arc<dyn CompletionLlm>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Loads the configured input, then runs every workflow.
    pub fn run(
        &self,
        resume: bool,
    ) -> Result<impl Stream<Item = PipelineRunResult> + '_, ExecutionError> {
        self.start(None, resume)
    }

    /// Runs every workflow over `input` as the root table.
    pub fn run_with_input(
        &self,
        input: Table,
        resume: bool,
    ) -> Result<impl Stream<Item = PipelineRunResult> + '_, ExecutionError> {
        self.start(Some(input), resume)
    }

    fn model(&self) -> Result<Arc<dyn CompletionLlm>, String> {
        match &self.llm {
            Some(llm) => Ok(Arc::clone(llm)),
            None => build_llm(&self.config.llm, &LlmServices::new(Arc::clone(&self.cache)))
                .map_err(|e| e.to_string()),
        }
    }

    /// Resolution and storage setup fail here, before anything runs.
    fn start(
        &self,
        input: Option<Table>,
        resume: bool,
    ) -> Result<impl Stream<Item = PipelineRunResult> + '_, ExecutionError> {
        let workflows = resolve_workflows(&self.config, &self.registry)?;
        let preprocessing = materialize(
            PREPROCESSING.to_string(),
            &self.config.preprocessing,
            &self.registry,
        )?;
        let storage = self.storage.child(&self.run_id)?;
        let llm = self.model();

        Ok(async_stream::stream! {
            let started = Instant::now();
            let mut stats = PipelineRunStats::default();
            if resume {
                if let Ok(Some(previous)) = PipelineRunStats::load(storage.as_ref()).await {
                    stats = previous;
                }
            }
            let earlier_runtime = stats.total_runtime;
            let (mut completed, mut skipped, mut failed) = (0, 0, false);

            let loaded = match input {
                Some(table) => Ok(table),
                None => {
                    let load_started = Instant::now();
                    let documents = self.load_documents().await;
                    stats.input_load_time = load_started.elapsed().as_secs_f64();
                    documents
                }
            };
            let mut root = match loaded {
                Ok(table) => Some(table),
                Err(error) => {
                    self.callbacks.error(INPUT_STAGE, None, &error);
                    failed = true;
                    yield PipelineRunResult::failure(INPUT_STAGE, error);
                    None
                }
            };

            if let Some(table) = root.take() {
                if preprocessing.steps.is_empty() {
                    root = Some(table);
                } else {
                    let none = HashMap::new();
                    match self.run_steps(&preprocessing, &table, &none, &storage, llm.clone()).await {
                        Ok((processed, _)) => root = Some(processed),
                        Err(error) => {
                            self.callbacks.error(PREPROCESSING, None, &error);
                            failed = true;
                            yield PipelineRunResult::failure(PREPROCESSING, error);
                        }
                    }
                }
            }

            if let Some(input) = root {
                stats.num_documents = input.len();
                let total = workflows.len();
                for (position, workflow) in workflows.iter().enumerate() {
                    if self.cancel.is_cancelled() {
                        let error = ExecutionError::Cancelled;
                        self.callbacks.error(&workflow.name, None, &error);
                        failed = true;
                        yield PipelineRunResult::failure(&workflow.name, error);
                        break;
                    }
                    if resume && matches!(storage.has(&checkpoint_key(&workflow.name)).await, Ok(true)) {
                        self.callbacks.workflow_skipped(&workflow.name);
                        skipped += 1;
                        continue;
                    }

                    self.callbacks.workflow_start(&workflow.name, position + 1, total);
                    let workflow_started = Instant::now();
                    let span = WorkflowStarted {
                        workflow: &workflow.name,
                        position: position + 1,
                        total,
                    }
                    .span("workflow");
                    let outcome = self
                        .run_workflow(workflow, &input, &storage, llm.clone())
                        .instrument(span)
                        .await;
                    match outcome {
                        Ok((table, mut workflow_stats)) => {
                            let elapsed = workflow_started.elapsed();
                            workflow_stats.overall = elapsed.as_secs_f64();
                            stats.workflows.insert(workflow.name.clone(), workflow_stats);
                            stats.total_runtime = earlier_runtime + started.elapsed().as_secs_f64();
                            stats.flush(storage.as_ref()).await;
                            self.callbacks.workflow_end(&workflow.name, table.len(), elapsed);
                            completed += 1;
                            yield PipelineRunResult::success(&workflow.name, table);
                        }
                        Err(error) => {
                            self.callbacks.error(&workflow.name, None, &error);
                            failed = true;
                            stats.total_runtime = earlier_runtime + started.elapsed().as_secs_f64();
                            stats.flush(storage.as_ref()).await;
                            yield PipelineRunResult::failure(&workflow.name, error);
                            break;
                        }
                    }
                }
            }

            stats.total_runtime = earlier_runtime + started.elapsed().as_secs_f64();
            stats.flush(storage.as_ref()).await;
            PipelineFinished {
                run_id: &self.run_id,
                workflows_run: completed,
                workflows_skipped: skipped,
                failed,
                elapsed: started.elapsed(),
            }
            .log();
        })
    }

    async fn load_documents(&self) -> Result<Table, ExecutionError> {
        let storage = create_storage(&self.config.input.storage)?;
        load_input(&self.config.input, storage.as_ref()).await
    }

    /// Injects dependencies, runs the steps and writes every output.
    async fn run_workflow(
        &self,
        workflow: &Workflow,
        input: &Table,
        storage: &Arc<dyn PipelineStorage>,
        llm: Result<Arc<dyn CompletionLlm>, String>,
    ) -> Result<(Table, WorkflowStats), ExecutionError> {
        let mut dependencies = HashMap::new();
        for name in workflow.dependencies() {
            let bytes = storage
                .get(&checkpoint_key(&name))
                .await?
                .ok_or_else(|| ExecutionError::MissingInput {
                    workflow: workflow.name.clone(),
                    name: format!("{}{}", WORKFLOW_PREFIX, name),
                })?;
            dependencies.insert(name, parquet::decode(&bytes)?);
        }

        let (table, steps) = self
            .run_steps(workflow, input, &dependencies, storage, llm)
            .await?;
        drop(dependencies);

        for emitter in create_emitters(&self.config.emit, storage) {
            emitter.emit(&workflow.name, &table).await?;
        }
        if self.config.memory_profile {
            let profile = Table::from_rows(
                steps
                    .iter()
                    .map(|s| {
                        let mut row = Row::new();
                        row.insert("verb".into(), json!(s.verb));
                        row.insert("runtime".into(), json!(s.runtime));
                        row.insert("rows".into(), json!(s.rows));
                        row.insert("approx_bytes".into(), json!(s.approx_bytes));
                        row
                    })
                    .collect(),
            );
            storage
                .set(&profile_key(&workflow.name), &csv::encode(&profile)?)
                .await?;
        }

        let stats = WorkflowStats {
            overall: 0.0,
            rows: table.len(),
            approx_bytes: table.approx_bytes(),
            steps,
        };
        Ok((table, stats))
    }

    async fn run_steps(
        &self,
        workflow: &Workflow,
        input: &Table,
        dependencies: &HashMap<String, Table>,
        storage: &Arc<dyn PipelineStorage>,
        llm: Result<Arc<dyn CompletionLlm>, String>,
    ) -> Result<(Table, Vec<StepStats>), ExecutionError> {
        let ctx = VerbContext::new(
            &workflow.name,
            &self.config,
            Arc::clone(storage),
            Arc::clone(&self.callbacks),
            &self.registry,
            self.cancel.clone(),
            llm,
        );
        let bound = |binding: &str| -> Result<Table, ExecutionError> {
            let table = if binding == INPUT_TABLE {
                Some(input)
            } else {
                workflow_reference(binding).and_then(|name| dependencies.get(name))
            };
            table.cloned().ok_or_else(|| ExecutionError::MissingInput {
                workflow: workflow.name.clone(),
                name: binding.to_string(),
            })
        };

        let mut current: Option<Table> = None;
        let mut steps = Vec::with_capacity(workflow.steps.len());
        for step in &workflow.steps {
            let source = match &step.input.source {
                Some(binding) => bound(binding.as_str())?,
                None => current.take().unwrap_or_else(|| input.clone()),
            };
            let others = step
                .input
                .others
                .iter()
                .map(|binding| bound(binding.as_str()))
                .collect::<Result<Vec<_>, _>>()?;

            let step_started = Instant::now();
            let output = tokio::select! {
                output = verbs::execute(&ctx, &step.verb, source, others) => output?,
                _ = self.cancel.cancelled() => return Err(ExecutionError::Cancelled),
            };
            let elapsed = step_started.elapsed();
            self.callbacks
                .step_end(&workflow.name, step.verb.name(), output.len(), elapsed);
            steps.push(StepStats {
                verb: step.verb.name().to_string(),
                runtime: elapsed.as_secs_f64(),
                rows: output.len(),
                approx_bytes: output.approx_bytes(),
            });
            current = Some(output);
        }
        Ok((current.unwrap_or_else(|| input.clone()), steps))
    }
}
