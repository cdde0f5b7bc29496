// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Execution of each [`Verb`] over tables.

mod chunk;
mod claims;
mod graph;
mod reports;

pub(crate) use chunk::content_id;

use crate::config::PipelineConfig;
use crate::errors::{ExecutionError, LlmError, ValidationError};
use crate::graph::ExtractedGraph;
use crate::llm::CompletionLlm;
use crate::observability::messages::pipeline::RowFailed;
use crate::observability::messages::StructuredLog;
use crate::runtime::WorkflowCallbacks;
use crate::storage::PipelineStorage;
use crate::table::Table;
use crate::workflow::{Verb, VerbRegistry};
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything a verb may use while it runs.
pub struct VerbContext<'a> {
    pub workflow: &'a str,
    pub config: &'a PipelineConfig,
    /// The run's output storage.
    pub storage: Arc<dyn PipelineStorage>,
    pub callbacks: Arc<dyn WorkflowCallbacks>,
    pub registry: &'a VerbRegistry,
    pub cancel: CancellationToken,
    llm: Result<Arc<dyn CompletionLlm>, String>,
}

impl<'a> VerbContext<'a> {
    /// `llm` is the run's model client, or the reason it could not be built.
    pub fn new(
        workflow: &'a str,
        config: &'a PipelineConfig,
        storage: Arc<dyn PipelineStorage>,
        callbacks: Arc<dyn WorkflowCallbacks>,
        registry: &'a VerbRegistry,
        cancel: CancellationToken,
        llm: Result<Arc<dyn CompletionLlm>, String>,
    ) -> Self {
        Self {
            workflow,
            config,
            storage,
            callbacks,
            registry,
            cancel,
            llm,
        }
    }

    pub fn llm(&self) -> Result<Arc<dyn CompletionLlm>, ExecutionError> {
        self.llm
            .clone()
            .map_err(|reason| ExecutionError::Llm(LlmError::Config(reason)))
    }

    fn concurrency(&self) -> usize {
        self.config.parallelization.num_threads.max(1)
    }

    /// Runs `work` over `items` with bounded concurrency, keeping input order.
    ///
    /// Each item carries a short label used when reporting its failure. A
    /// failed item is reported through the callbacks and dropped from the
    /// output; cancellation aborts the whole fan-out.
    pub(crate) async fn fan_out<I, R, F, Fut>(
        &self,
        verb: &str,
        items: Vec<(String, I)>,
        work: F,
    ) -> Result<Vec<R>, ExecutionError>
    where
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<R, ExecutionError>>,
    {
        let work = &work;
        let pending = stream::iter(items.into_iter().enumerate())
            .map(|(index, (label, item))| async move { (index, label, work(item).await) })
            .buffer_unordered(self.concurrency())
            .collect::<Vec<_>>();

        let mut results = tokio::select! {
            results = pending => results,
            _ = self.cancel.cancelled() => return Err(ExecutionError::Cancelled),
        };
        results.sort_by_key(|(index, _, _)| *index);

        let mut out = Vec::with_capacity(results.len());
        for (index, label, result) in results {
            match result {
                Ok(value) => out.push(value),
                Err(ExecutionError::Cancelled) => return Err(ExecutionError::Cancelled),
                Err(error) => {
                    let message = error.to_string();
                    RowFailed {
                        verb,
                        row: index,
                        snippet: &label,
                        error: &message,
                    }
                    .log();
                    self.callbacks.error(self.workflow, Some(index), &error);
                }
            }
        }
        Ok(out)
    }
}

/// Reads the graph stored as JSON text in `column` of `row`.
pub(crate) fn graph_at(table: &Table, row: usize, column: &str) -> Result<ExtractedGraph, ExecutionError> {
    let text = table.str_at(row, column)?;
    Ok(ExtractedGraph::from_json(text)?)
}

/// Short, single-line prefix of `text` for failure reports.
pub(crate) fn snippet(text: &str) -> String {
    text.chars().take(40).collect::<String>().replace('\n', " ")
}

pub(crate) async fn execute(
    ctx: &VerbContext<'_>,
    verb: &Verb,
    input: Table,
    others: Vec<Table>,
) -> Result<Table, ExecutionError> {
    match verb {
        Verb::Select(args) => Ok(input.select(&args.columns)?),
        Verb::Rename(args) => Ok(input.rename(&args.columns)?),
        Verb::Concat(_) => Ok(Table::concat(std::iter::once(&input).chain(others.iter()))),
        Verb::Chunk(args) => chunk::chunk(ctx, &input, args),
        Verb::ExtractGraph(args) => graph::extract_graph(ctx, &input, args).await,
        Verb::MergeGraphs(args) => graph::merge_graphs(&input, args),
        Verb::SummarizeDescriptions(args) => graph::summarize_descriptions(ctx, &input, args).await,
        Verb::ClusterGraph(args) => graph::cluster(ctx, &input, args),
        Verb::SnapshotGraph(args) => graph::snapshot(ctx, input, args).await,
        Verb::UnpackGraph(args) => graph::unpack(&input, args),
        Verb::ExtractClaims(args) => claims::extract_claims(ctx, &input, args).await,
        Verb::SummarizeCommunities(args) => reports::summarize_communities(ctx, &input, args).await,
        Verb::Custom { name, args } => {
            let custom = ctx.registry.get(name).ok_or_else(|| ValidationError::UnknownVerb {
                workflow: ctx.workflow.to_string(),
                verb: name.clone(),
            })?;
            custom.execute(ctx, input, others, args).await
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::context;
    use super::*;
    use crate::row;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        rows: Mutex<Vec<Option<usize>>>,
    }

    impl WorkflowCallbacks for Recorder {
        fn error(&self, _workflow: &str, row: Option<usize>, _error: &dyn std::error::Error) {
            self.rows.lock().unwrap().push(row);
        }
    }

    #[tokio::test]
    async fn test_fan_out_keeps_order_and_skips_failures() {
        let config = PipelineConfig::default();
        let registry = VerbRegistry::new();
        let recorder = Arc::new(Recorder::default());
        let mut ctx = context(&config, &registry, None);
        ctx.callbacks = recorder.clone() as Arc<dyn WorkflowCallbacks>;

        let items: Vec<(String, u64)> = (0..6).map(|i| (format!("item {}", i), i)).collect();
        let out = ctx
            .fan_out("double", items, |i| async move {
                tokio::time::sleep(std::time::Duration::from_millis(10 * (6 - i))).await;
                if i == 3 {
                    Err(ExecutionError::step_failed("test", "double", "three"))
                } else {
                    Ok(i * 2)
                }
            })
            .await
            .unwrap();

        assert_eq!(out, vec![0, 2, 4, 8, 10]);
        assert_eq!(*recorder.rows.lock().unwrap(), vec![Some(3)]);
    }

    #[tokio::test]
    async fn test_fan_out_stops_on_cancellation() {
        let config = PipelineConfig::default();
        let registry = VerbRegistry::new();
        let ctx = context(&config, &registry, None);
        ctx.cancel.cancel();

        let result = ctx
            .fan_out("wait", vec![("a".to_string(), ())], |_| async {
                std::future::pending::<Result<(), ExecutionError>>().await
            })
            .await;
        assert!(matches!(result, Err(ExecutionError::Cancelled)));
    }

    #[tokio::test]
    async fn test_table_verbs() {
        let config = PipelineConfig::default();
        let registry = VerbRegistry::new();
        let ctx = context(&config, &registry, None);
        let left = Table::from_rows(vec![row! {"id" => "a", "n" => 1}]);
        let right = Table::from_rows(vec![row! {"id" => "b", "m" => 2}]);

        let joined = execute(&ctx, &Verb::Concat(Default::default()), left, vec![right])
            .await
            .unwrap();
        assert_eq!(joined.columns(), ["id", "n", "m"]);
        assert_eq!(joined.len(), 2);

        let selected = execute(
            &ctx,
            &Verb::Select(crate::workflow::SelectArgs {
                columns: vec!["id".into()],
            }),
            joined,
            vec![],
        )
        .await
        .unwrap();
        assert_eq!(selected.columns(), ["id"]);
    }

    #[tokio::test]
    async fn test_model_verbs_fail_without_a_client() {
        let config = PipelineConfig::default();
        let registry = VerbRegistry::new();
        let ctx = context(&config, &registry, None);
        assert!(matches!(ctx.llm(), Err(ExecutionError::Llm(LlmError::Config(_)))));
    }
}
