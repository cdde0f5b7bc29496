// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::cache::{MemoryCache, PipelineCache};
use crate::config::{PipelineConfig, StepConfig, WorkflowReference};
use crate::errors::{ExecutionError, LlmError, ValidationError};
use crate::llm::mock::StaticLlm;
use crate::llm::{build_llm_with_provider, CompletionLlm, LlmServices};
use crate::row;
use crate::runtime::{checkpoint_key, PipelineRunResult, PipelineRunStats, PipelineRunner};
use crate::storage::{MemoryStorage, PipelineStorage};
use crate::table::{parquet, Table};
use crate::workflow::{CustomVerb, VerbContext, VerbRegistry};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Passes its input through, counting calls; fails the first `failures` calls.
struct Counting {
    calls: AtomicUsize,
    failures: usize,
}

impl Counting {
    fn failing_first(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            failures,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CustomVerb for Counting {
    async fn execute(
        &self,
        ctx: &VerbContext<'_>,
        input: Table,
        _others: Vec<Table>,
        _args: &Value,
    ) -> Result<Table, ExecutionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(ExecutionError::step_failed(ctx.workflow, "count", "transient"));
        }
        Ok(input)
    }
}

fn documents() -> Table {
    Table::from_rows(vec![
        row! {"id" => "d1", "text" => "Alice works at Acme.", "title" => "alice.txt"},
        row! {"id" => "d2", "text" => "Bob works at Acme.", "title" => "bob.txt"},
    ])
}

fn step(verb: &str, source: Option<&str>) -> StepConfig {
    let step = StepConfig::new(verb, json!({}));
    match source {
        Some(source) => step.with_source(source),
        None => step,
    }
}

fn runner(
    config: PipelineConfig,
    storage: &Arc<dyn PipelineStorage>,
    registry: VerbRegistry,
) -> PipelineRunner {
    let cache: Arc<dyn PipelineCache> = Arc::new(MemoryCache::new());
    PipelineRunner::new(config, Arc::clone(storage), cache)
        .with_run_id("run")
        .with_registry(registry)
        .with_callbacks(Arc::new(crate::runtime::NoopCallbacks))
}

async fn run(runner: &PipelineRunner, resume: bool) -> Vec<PipelineRunResult> {
    runner
        .run_with_input(documents(), resume)
        .unwrap()
        .collect()
        .await
}

fn names(results: &[PipelineRunResult]) -> Vec<&str> {
    results.iter().map(|r| r.workflow.as_str()).collect()
}

#[tokio::test]
async fn test_resume_runs_only_missing_workflows() {
    let counter = Counting::failing_first(0);
    let mut registry = VerbRegistry::new();
    registry.register("count", counter.clone());

    let config = PipelineConfig {
        workflows: vec![
            WorkflowReference::with_steps("a", vec![step("count", Some("input"))]),
            WorkflowReference::with_steps("b", vec![step("count", Some("input"))]),
            WorkflowReference::with_steps(
                "c",
                vec![StepConfig::new("concat", json!({}))
                    .with_source("workflow:a")
                    .with_others(vec!["workflow:b".into()])],
            ),
        ],
        ..PipelineConfig::default()
    };
    let storage: Arc<dyn PipelineStorage> = Arc::new(MemoryStorage::new());
    let runner = runner(config, &storage, registry);

    let first = run(&runner, false).await;
    assert_eq!(names(&first), vec!["a", "b", "c"]);
    assert!(first.iter().all(PipelineRunResult::is_success));
    assert_eq!(first[2].table.as_ref().map(Table::len), Some(4));
    assert_eq!(counter.calls(), 2);

    let run_storage = storage.child("run").unwrap();
    run_storage.delete(&checkpoint_key("c")).await.unwrap();

    let second = run(&runner, true).await;
    assert_eq!(names(&second), vec!["c"]);
    assert_eq!(counter.calls(), 2);
    assert!(run_storage.has(&checkpoint_key("c")).await.unwrap());
}

#[tokio::test]
async fn test_failed_run_resumes_from_last_checkpoint() {
    let base = Counting::failing_first(0);
    let flaky = Counting::failing_first(1);
    let mut registry = VerbRegistry::new();
    registry.register("count", base.clone());
    registry.register("flaky", flaky.clone());

    let config = PipelineConfig {
        workflows: vec![
            WorkflowReference::with_steps("base", vec![step("count", None)]),
            WorkflowReference::with_steps("mid", vec![step("flaky", Some("workflow:base"))]),
            WorkflowReference::with_steps(
                "final",
                vec![StepConfig::new("select", json!({"columns": ["id"]})).with_source("workflow:mid")],
            ),
        ],
        ..PipelineConfig::default()
    };
    let storage: Arc<dyn PipelineStorage> = Arc::new(MemoryStorage::new());
    let runner = runner(config, &storage, registry);

    let first = run(&runner, false).await;
    assert_eq!(names(&first), vec!["base", "mid"]);
    assert!(first[0].is_success());
    assert!(matches!(first[1].errors[..], [ExecutionError::StepFailed { .. }]));

    let run_storage = storage.child("run").unwrap();
    assert!(run_storage.has(&checkpoint_key("base")).await.unwrap());
    assert!(!run_storage.has(&checkpoint_key("mid")).await.unwrap());

    let second = run(&runner, true).await;
    assert_eq!(names(&second), vec!["mid", "final"]);
    assert!(second.iter().all(PipelineRunResult::is_success));
    assert_eq!(base.calls(), 1);
    assert_eq!(flaky.calls(), 2);

    for name in ["base", "mid", "final"] {
        assert!(run_storage.has(&checkpoint_key(name)).await.unwrap(), "{}", name);
    }
    let bytes = run_storage.get(&checkpoint_key("final")).await.unwrap().unwrap();
    let final_table = parquet::decode(&bytes).unwrap();
    assert_eq!(final_table.columns(), ["id"]);
    assert_eq!(final_table.len(), 2);

    let stats = PipelineRunStats::load(run_storage.as_ref()).await.unwrap().unwrap();
    let recorded: Vec<&str> = stats.workflows.keys().map(String::as_str).collect();
    assert_eq!(recorded, vec!["base", "final", "mid"]);
    assert_eq!(stats.num_documents, 2);
}

#[tokio::test]
async fn test_cycles_are_rejected_before_running() {
    let config = PipelineConfig {
        workflows: vec![
            WorkflowReference::with_steps("a", vec![step("concat", Some("workflow:b"))]),
            WorkflowReference::with_steps("b", vec![step("concat", Some("workflow:a"))]),
        ],
        ..PipelineConfig::default()
    };
    let storage: Arc<dyn PipelineStorage> = Arc::new(MemoryStorage::new());
    let runner = runner(config, &storage, VerbRegistry::new());

    let result = runner.run_with_input(documents(), false).map(|_| ());
    assert!(matches!(
        result,
        Err(ExecutionError::Validation(ValidationError::CyclicDependency { .. }))
    ));
    assert!(storage.list_keys(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancelled_run_stops_before_the_next_workflow() {
    let config = PipelineConfig {
        workflows: vec![WorkflowReference::with_steps("a", vec![step("concat", None)])],
        ..PipelineConfig::default()
    };
    let storage: Arc<dyn PipelineStorage> = Arc::new(MemoryStorage::new());
    let cancel = CancellationToken::new();
    let runner = runner(config, &storage, VerbRegistry::new()).with_cancellation(cancel.clone());
    cancel.cancel();

    let results = run(&runner, false).await;
    assert_eq!(names(&results), vec!["a"]);
    assert!(matches!(results[0].errors[..], [ExecutionError::Cancelled]));
    let run_storage = storage.child("run").unwrap();
    assert!(!run_storage.has(&checkpoint_key("a")).await.unwrap());
}

#[tokio::test]
async fn test_memory_profile_is_written_per_workflow() {
    let config = PipelineConfig {
        memory_profile: true,
        workflows: vec![WorkflowReference::with_steps(
            "ids",
            vec![StepConfig::new("select", json!({"columns": ["id"]}))],
        )],
        ..PipelineConfig::default()
    };
    let storage: Arc<dyn PipelineStorage> = Arc::new(MemoryStorage::new());
    let runner = runner(config, &storage, VerbRegistry::new());

    let results = run(&runner, false).await;
    assert!(results[0].is_success());

    let run_storage = storage.child("run").unwrap();
    let profile = run_storage
        .get_text("ids_profiling.steps.csv", None)
        .await
        .unwrap()
        .unwrap();
    let mut lines = profile.lines();
    assert_eq!(lines.next(), Some("verb,runtime,rows,approx_bytes"));
    assert!(lines.next().unwrap().starts_with("select,"));
}

#[tokio::test]
async fn test_preprocessing_runs_before_workflows() {
    let config = PipelineConfig {
        preprocessing: vec![StepConfig::new("select", json!({"columns": ["id", "text"]}))],
        workflows: vec![WorkflowReference::with_steps("copy", vec![step("concat", None)])],
        ..PipelineConfig::default()
    };
    let storage: Arc<dyn PipelineStorage> = Arc::new(MemoryStorage::new());
    let runner = runner(config, &storage, VerbRegistry::new());

    let results = run(&runner, false).await;
    let table = results[0].table.as_ref().unwrap();
    assert_eq!(table.columns(), ["id", "text"]);
}

fn indexing_model() -> Arc<StaticLlm> {
    Arc::new(StaticLlm::from_fn(|request, _| {
        let text = request.variables.get("input_text").cloned().unwrap_or_default();
        match request.name.as_str() {
            "extract-graph" => {
                let person = if text.contains("Alice") { "ALICE" } else { "BOB" };
                Ok(format!(
                    "(\"entity\"<|>{p}<|>PERSON<|>{p} works at Acme)##\
                     (\"entity\"<|>ACME<|>ORGANIZATION<|>A company)##\
                     (\"relationship\"<|>{p}<|>ACME<|>{p} is employed by Acme<|>1)<|COMPLETE|>",
                    p = person
                ))
            }
            "summarize-descriptions" => Ok("Acme is a company employing Alice and Bob.".to_string()),
            "community-report" => Ok(json!({
                "title": "Acme and its staff",
                "summary": "Alice and Bob work at Acme.",
                "rating": 3.0,
                "rating_explanation": "Low impact",
                "findings": [{"summary": "Employment", "explanation": "Both work at Acme."}]
            })
            .to_string()),
            "extract-graph-loop" => Ok("NO".to_string()),
            "extract-graph-continue" => Ok("<|COMPLETE|>".to_string()),
            other => Err(LlmError::Decode(format!("unexpected request {}", other))),
        }
    }))
}

#[tokio::test]
async fn test_default_workflows_index_a_small_corpus() {
    let config = PipelineConfig::default();
    let cache: Arc<dyn PipelineCache> = Arc::new(MemoryCache::new());
    let llm: Arc<dyn CompletionLlm> = build_llm_with_provider(
        indexing_model(),
        &config.llm,
        &LlmServices::new(Arc::clone(&cache)),
    )
    .unwrap();
    let storage: Arc<dyn PipelineStorage> = Arc::new(MemoryStorage::new());
    let runner = PipelineRunner::new(config, Arc::clone(&storage), cache)
        .with_run_id("e2e")
        .with_llm(llm);

    let results: Vec<PipelineRunResult> =
        runner.run_with_input(documents(), false).unwrap().collect().await;
    for result in &results {
        assert!(result.is_success(), "{}: {:?}", result.workflow, result.errors);
    }
    assert_eq!(results.len(), 8);

    let table = |name: &str| {
        results
            .iter()
            .find(|r| r.workflow == name)
            .and_then(|r| r.table.clone())
            .unwrap()
    };

    let entities = table("create_final_entities");
    let mut titles: Vec<&str> = (0..entities.len())
        .map(|i| entities.str_at(i, "title").unwrap())
        .collect();
    titles.sort();
    assert_eq!(titles, vec!["ACME", "ALICE", "BOB"]);

    let relationships = table("create_final_relationships");
    assert_eq!(relationships.len(), 2);
    assert!(relationships.rows().iter().all(|r| r["weight"] == json!(1.0)));

    let reports = table("create_final_community_reports");
    assert!(!reports.is_empty());
    assert_eq!(reports.rows()[0]["title"], json!("Acme and its staff"));

    let run_storage = storage.child("e2e").unwrap();
    assert!(run_storage.has("stats.json").await.unwrap());
}
