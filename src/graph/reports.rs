// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::LlmError;
use crate::graph::cluster::Community;
use crate::graph::model::ExtractedGraph;
use crate::graph::prompts;
use crate::llm::{estimate_tokens, CompletionLlm, CompletionRequest, JsonValidator};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityReport {
    pub community: usize,
    pub level: usize,
    pub title: String,
    pub summary: String,
    pub rating: f64,
    pub rating_explanation: String,
    pub findings: Vec<Finding>,
    /// Markdown rendering of the whole report.
    pub full_content: String,
}

#[derive(Deserialize)]
struct ReportBody {
    title: String,
    summary: String,
    rating: f64,
    #[serde(default)]
    rating_explanation: String,
    findings: Vec<Finding>,
}

/// Accepts objects with a string title and summary, a numeric rating and a
/// list of findings.
pub fn report_validator() -> JsonValidator {
    Arc::new(|value: &Value| {
        value.get("title").is_some_and(Value::is_string)
            && value.get("summary").is_some_and(Value::is_string)
            && value.get("rating").is_some_and(Value::is_number)
            && value.get("findings").is_some_and(Value::is_array)
    })
}

/// Renders the entities and internal relationships of `members` as two
/// CSV-like sections, highest degree first, stopping before `max_tokens`.
pub fn build_context(graph: &ExtractedGraph, members: &[String], max_tokens: usize) -> String {
    let member_set: BTreeSet<&str> = members.iter().map(String::as_str).collect();
    let degrees = graph.degrees();

    let mut entities: Vec<(&String, usize, String)> = graph
        .nodes()
        .filter(|(id, _)| member_set.contains(id.as_str()))
        .map(|(id, node)| (id, degrees.get(id).copied().unwrap_or(0), node.description()))
        .collect();
    entities.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

    let mut relationships: Vec<(&String, &String, usize, String)> = graph
        .edges()
        .into_iter()
        .filter(|(s, t, _)| member_set.contains(s.as_str()) && member_set.contains(t.as_str()))
        .map(|(s, t, edge)| {
            let combined = degrees.get(s).copied().unwrap_or(0) + degrees.get(t).copied().unwrap_or(0);
            (s, t, combined, edge.description())
        })
        .collect();
    relationships.sort_by(|a, b| b.2.cmp(&a.2).then((a.0, a.1).cmp(&(b.0, b.1))));

    let budget = max_tokens as u64;
    let mut context = String::from("-----Entities-----\nid,entity,description,degree\n");
    let mut used = estimate_tokens(&context);
    for (position, (id, degree, description)) in entities.into_iter().enumerate() {
        let line = format!("{},{},{},{}\n", position, id, one_line(&description), degree);
        let tokens = estimate_tokens(&line);
        if used + tokens > budget {
            return context;
        }
        used += tokens;
        context.push_str(&line);
    }

    let header = "\n-----Relationships-----\nid,source,target,description,combined_degree\n";
    used += estimate_tokens(header);
    if used > budget {
        return context;
    }
    context.push_str(header);
    for (position, (source, target, combined, description)) in relationships.into_iter().enumerate() {
        let line = format!(
            "{},{},{},{},{}\n",
            position,
            source,
            target,
            one_line(&description),
            combined
        );
        let tokens = estimate_tokens(&line);
        if used + tokens > budget {
            break;
        }
        used += tokens;
        context.push_str(&line);
    }
    context
}

fn one_line(text: &str) -> String {
    text.replace(['\n', '\r'], " ")
}

/// Asks the model for a structured report on one community.
pub struct CommunityReporter {
    llm: Arc<dyn CompletionLlm>,
    prompt: String,
    max_input_tokens: usize,
}

impl CommunityReporter {
    pub fn new(llm: Arc<dyn CompletionLlm>, max_input_tokens: usize) -> Self {
        Self {
            llm,
            prompt: prompts::COMMUNITY_REPORT.to_string(),
            max_input_tokens,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub async fn report(
        &self,
        graph: &ExtractedGraph,
        community: &Community,
    ) -> Result<CommunityReport, LlmError> {
        let context = build_context(graph, &community.nodes, self.max_input_tokens);
        let request = CompletionRequest::new("community-report", self.prompt.clone())
            .with_variable("input_text", context)
            .with_validator(report_validator());
        let response = self.llm.invoke(request).await?;

        let value = response.json.ok_or_else(|| LlmError::StructuredOutput {
            name: "community-report".to_string(),
            reason: "no structured output returned".to_string(),
        })?;
        let body: ReportBody =
            serde_json::from_value(value).map_err(|e| LlmError::StructuredOutput {
                name: "community-report".to_string(),
                reason: e.to_string(),
            })?;

        let full_content = render_markdown(&body);
        Ok(CommunityReport {
            community: community.id,
            level: community.level,
            title: body.title,
            summary: body.summary,
            rating: body.rating,
            rating_explanation: body.rating_explanation,
            findings: body.findings,
            full_content,
        })
    }
}

fn render_markdown(body: &ReportBody) -> String {
    let mut out = format!("# {}\n\n{}\n", body.title, body.summary);
    for finding in &body.findings {
        out.push_str(&format!("\n## {}\n\n{}\n", finding.summary, finding.explanation));
    }
    out
}
