// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::LlmError;
use crate::graph::model::ExtractedGraph;
use crate::graph::prompts;
use crate::llm::{estimate_tokens, CompletionLlm, CompletionRequest};
use futures::stream::{self, StreamExt};
use serde_json::json;
use std::sync::Arc;

/// A node or edge whose descriptions could not be summarized; its joined
/// descriptions are kept instead.
#[derive(Debug)]
pub struct SummaryFailure {
    pub id: String,
    pub error: LlmError,
}

enum Target {
    Node(String),
    Edge(String, String),
}

impl Target {
    fn label(&self) -> String {
        match self {
            Target::Node(id) => id.clone(),
            Target::Edge(s, t) => format!("{} -> {}", s, t),
        }
    }
}

/// Collapses the merged descriptions of nodes and edges into one.
///
/// A single description no longer than `max_length` characters is kept as
/// is. Otherwise the descriptions are fed to the model in batches that fit
/// `max_input_tokens`; each batch's summary seeds the next batch.
pub struct DescriptionSummarizer {
    llm: Arc<dyn CompletionLlm>,
    prompt: String,
    max_length: usize,
    max_input_tokens: u64,
}

impl DescriptionSummarizer {
    pub fn new(llm: Arc<dyn CompletionLlm>, max_length: usize, max_input_tokens: u64) -> Self {
        Self {
            llm,
            prompt: prompts::SUMMARIZE_DESCRIPTIONS.to_string(),
            max_length,
            max_input_tokens,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn needs_summary(&self, descriptions: &[String]) -> bool {
        match descriptions {
            [] => false,
            [only] => only.chars().count() > self.max_length,
            _ => true,
        }
    }

    /// Summarizes the descriptions of `id`.
    pub async fn summarize(&self, id: &str, descriptions: &[String]) -> Result<String, LlmError> {
        if !self.needs_summary(descriptions) {
            return Ok(descriptions.first().cloned().unwrap_or_default());
        }

        let mut sorted: Vec<&String> = descriptions.iter().collect();
        sorted.sort();
        sorted.dedup();

        let budget = self
            .max_input_tokens
            .saturating_sub(estimate_tokens(&self.prompt))
            .max(1);
        let mut batch: Vec<String> = Vec::new();
        let mut used = 0;
        for description in sorted {
            let tokens = estimate_tokens(description);
            if batch.len() > 1 && used + tokens > budget {
                let partial = self.summarize_batch(id, &batch).await?;
                used = estimate_tokens(&partial);
                batch = vec![partial];
            }
            used += tokens;
            batch.push(description.clone());
        }
        self.summarize_batch(id, &batch).await
    }

    async fn summarize_batch(&self, id: &str, batch: &[String]) -> Result<String, LlmError> {
        let list = serde_json::to_string(batch).map_err(|e| LlmError::Decode(e.to_string()))?;
        let request = CompletionRequest::new("summarize-descriptions", self.prompt.clone())
            .with_variable("entity_name", id)
            .with_variable("description_list", list)
            .with_variable("max_length", self.max_length.to_string())
            .with_parameter("max_tokens", json!(self.max_length));
        let response = self.llm.invoke(request).await?;
        Ok(response.output.trim().to_string())
    }

    /// Summarizes every node and edge of `graph`, up to `concurrency` at a time.
    pub async fn summarize_graph(
        &self,
        graph: &ExtractedGraph,
        concurrency: usize,
    ) -> (ExtractedGraph, Vec<SummaryFailure>) {
        let mut targets: Vec<(Target, Vec<String>)> = graph
            .nodes()
            .map(|(id, node)| (Target::Node(id.clone()), node.descriptions.clone()))
            .collect();
        targets.extend(graph.edges().into_iter().map(|(s, t, edge)| {
            (Target::Edge(s.clone(), t.clone()), edge.descriptions.clone())
        }));

        let results: Vec<(Target, Result<String, LlmError>)> = stream::iter(targets)
            .filter(|(_, descriptions)| {
                let needed = self.needs_summary(descriptions);
                async move { needed }
            })
            .map(|(target, descriptions)| async move {
                let result = self.summarize(&target.label(), &descriptions).await;
                (target, result)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let mut summarized = graph.clone();
        let mut failures = Vec::new();
        for (target, result) in results {
            let summary = match result {
                Ok(summary) => summary,
                Err(error) => {
                    failures.push(SummaryFailure {
                        id: target.label(),
                        error,
                    });
                    continue;
                }
            };
            let descriptions = match &target {
                Target::Node(id) => summarized.node_mut(id).map(|n| &mut n.descriptions),
                Target::Edge(s, t) => summarized.edge_mut(s, t).map(|e| &mut e.descriptions),
            };
            if let Some(descriptions) = descriptions {
                *descriptions = vec![summary];
            }
        }
        failures.sort_by(|a, b| a.id.cmp(&b.id));
        (summarized, failures)
    }
}
