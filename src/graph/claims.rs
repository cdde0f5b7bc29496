// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::LlmError;
use crate::graph::extract::{glean, GleaningPrompts};
use crate::graph::model::{clean_text, normalize_id};
use crate::graph::prompts;
use crate::graph::records::RecordDelimiters;
use crate::llm::{CompletionLlm, CompletionRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A claim (covariate) made about an entity in one chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub subject_id: String,
    pub object_id: Option<String>,
    #[serde(rename = "type")]
    pub claim_type: Option<String>,
    pub status: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub description: Option<String>,
    pub source_text: Option<String>,
    pub text_unit_id: String,
}

pub struct ClaimExtractor {
    llm: Arc<dyn CompletionLlm>,
    prompt: String,
    entity_specs: Vec<String>,
    description: String,
    max_gleanings: u32,
    delimiters: RecordDelimiters,
}

impl ClaimExtractor {
    pub fn new(
        llm: Arc<dyn CompletionLlm>,
        entity_specs: Vec<String>,
        description: impl Into<String>,
        max_gleanings: u32,
    ) -> Self {
        Self {
            llm,
            prompt: prompts::CLAIM_EXTRACTION.to_string(),
            entity_specs,
            description: description.into(),
            max_gleanings,
            delimiters: RecordDelimiters::default(),
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub async fn extract(&self, text_unit_id: &str, text: &str) -> Result<Vec<Claim>, LlmError> {
        let request = CompletionRequest::new("extract-claims", self.prompt.clone())
            .with_variable("input_text", text)
            .with_variable("entity_specs", self.entity_specs.join(", "))
            .with_variable("claim_description", self.description.clone())
            .with_variable("tuple_delimiter", self.delimiters.tuple.clone())
            .with_variable("record_delimiter", self.delimiters.record.clone())
            .with_variable("completion_delimiter", self.delimiters.completion.clone());

        let output = glean(
            self.llm.as_ref(),
            request,
            self.max_gleanings,
            GleaningPrompts {
                continue_prompt: prompts::CONTINUE_CLAIMS,
                loop_prompt: prompts::LOOP_CHECK_CLAIMS,
            },
        )
        .await?;
        let output = output.replace(&self.delimiters.completion, &self.delimiters.record);
        Ok(parse_claims(&output, text_unit_id, &self.delimiters))
    }
}

/// Parses claim records; `NONE` fields become absent and records without a
/// subject are dropped.
pub fn parse_claims(output: &str, text_unit_id: &str, delimiters: &RecordDelimiters) -> Vec<Claim> {
    delimiters
        .split(output)
        .into_iter()
        .filter_map(|fields| {
            let field = |i: usize| {
                fields
                    .get(i)
                    .map(|f| clean_text(f))
                    .filter(|f| !f.is_empty() && !f.eq_ignore_ascii_case("none"))
            };
            let subject_id = field(0).map(|s| normalize_id(&s))?;
            Some(Claim {
                subject_id,
                object_id: field(1).map(|s| normalize_id(&s)),
                claim_type: field(2).map(|s| s.to_uppercase()),
                status: field(3).map(|s| s.to_uppercase()),
                start_date: field(4),
                end_date: field(5),
                description: field(6),
                source_text: field(7),
                text_unit_id: text_unit_id.to_string(),
            })
        })
        .collect()
}
