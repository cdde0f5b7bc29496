// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::LlmError;
use crate::graph::model::ExtractedGraph;
use crate::graph::prompts;
use crate::graph::records::{parse_graph, RecordDelimiters};
use crate::llm::{CompletionLlm, CompletionRequest};
use serde_json::json;
use std::sync::Arc;

/// Prompts that drive the continuation rounds of a gleaning extraction.
pub(crate) struct GleaningPrompts<'a> {
    pub continue_prompt: &'a str,
    pub loop_prompt: &'a str,
}

/// Runs `request`, then up to `max_gleanings` continuation rounds on the same
/// conversation, asking after each round (except the last) whether more
/// records remain. Returns every round's output concatenated.
pub(crate) async fn glean(
    llm: &dyn CompletionLlm,
    request: CompletionRequest,
    max_gleanings: u32,
    prompts: GleaningPrompts<'_>,
) -> Result<String, LlmError> {
    let name = request.name.clone();
    let first = llm.invoke(request).await?;
    let mut output = first.output;
    let mut history = first.history;

    for round in 0..max_gleanings {
        let more = llm
            .invoke(
                CompletionRequest::new(format!("{}-continue", name), prompts.continue_prompt)
                    .with_history(history),
            )
            .await?;
        output.push_str(&more.output);
        history = more.history;

        if round + 1 >= max_gleanings {
            break;
        }
        let check = llm
            .invoke(
                CompletionRequest::new(format!("{}-loop", name), prompts.loop_prompt)
                    .with_history(history.clone())
                    .with_parameter("max_tokens", json!(1)),
            )
            .await?;
        if !check.output.trim().to_uppercase().starts_with('Y') {
            break;
        }
    }
    Ok(output)
}

/// Extracts an entity/relationship sub-graph from one chunk of text.
pub struct GraphExtractor {
    llm: Arc<dyn CompletionLlm>,
    prompt: String,
    entity_types: Vec<String>,
    max_gleanings: u32,
    delimiters: RecordDelimiters,
}

impl GraphExtractor {
    pub fn new(llm: Arc<dyn CompletionLlm>, entity_types: Vec<String>, max_gleanings: u32) -> Self {
        Self {
            llm,
            prompt: prompts::GRAPH_EXTRACTION.to_string(),
            entity_types,
            max_gleanings,
            delimiters: RecordDelimiters::default(),
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn with_delimiters(mut self, delimiters: RecordDelimiters) -> Self {
        self.delimiters = delimiters;
        self
    }

    /// `source_id` identifies the chunk in the node and edge provenance.
    pub async fn extract(&self, source_id: &str, text: &str) -> Result<ExtractedGraph, LlmError> {
        let request = CompletionRequest::new("extract-graph", self.prompt.clone())
            .with_variable("input_text", text)
            .with_variable("entity_types", self.entity_types.join(","))
            .with_variable("tuple_delimiter", self.delimiters.tuple.clone())
            .with_variable("record_delimiter", self.delimiters.record.clone())
            .with_variable("completion_delimiter", self.delimiters.completion.clone());

        let output = glean(
            self.llm.as_ref(),
            request,
            self.max_gleanings,
            GleaningPrompts {
                continue_prompt: prompts::CONTINUE_EXTRACTION,
                loop_prompt: prompts::LOOP_CHECK,
            },
        )
        .await?;

        let output = output.replace(&self.delimiters.completion, &self.delimiters.record);
        Ok(parse_graph(&output, source_id, &self.delimiters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::StaticLlm;
    use crate::llm::{HistoryLlm, TemplateLlm};

    fn scripted(responses: Vec<&str>) -> Arc<StaticLlm> {
        Arc::new(StaticLlm::scripted(
            responses.into_iter().map(|r| Ok(r.to_string())).collect(),
        ))
    }

    #[tokio::test]
    async fn test_gleaning_appends_continuations_until_no() {
        let provider = scripted(vec![
            "(\"entity\"<|>ALICE<|>PERSON<|>Alice)<|COMPLETE|>",
            "(\"entity\"<|>ACME<|>ORGANIZATION<|>Acme)",
            "NO",
        ]);
        let llm = Arc::new(TemplateLlm::new(Arc::new(HistoryLlm::new(provider.clone()))));
        let extractor = GraphExtractor::new(llm, vec!["person".into()], 3);

        let graph = extractor.extract("c1", "Alice works at Acme.").await.unwrap();

        assert_eq!(graph.node_count(), 2);
        assert_eq!(provider.calls(), 3);
        assert!(provider.inputs()[0].contains("Alice works at Acme."));
        assert_eq!(provider.inputs()[1], prompts::CONTINUE_EXTRACTION);
        assert_eq!(provider.inputs()[2], prompts::LOOP_CHECK);
    }

    #[tokio::test]
    async fn test_zero_gleanings_makes_one_call() {
        let provider = scripted(vec!["(\"entity\"<|>ALICE<|>PERSON<|>Alice)"]);
        let extractor = GraphExtractor::new(provider.clone(), vec![], 0);

        let graph = extractor.extract("c1", "text").await.unwrap();
        assert_eq!(graph.node_count(), 1);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_last_gleaning_round_skips_loop_check() {
        let provider = scripted(vec!["", "", "YES", ""]);
        let extractor = GraphExtractor::new(provider.clone(), vec![], 2);

        extractor.extract("c1", "text").await.unwrap();
        assert_eq!(provider.calls(), 4);
    }
}
