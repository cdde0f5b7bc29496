// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::LlmError;
use crate::llm::{CompletionLlm, CompletionRequest, CompletionResponse};
use crate::observability::messages::llm::StructuredOutputRepair;
use crate::observability::messages::StructuredLog;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub const DEFAULT_JSON_ATTEMPTS: u32 = 3;

const REFORMAT_PROMPT: &str = "The following text was supposed to be a single valid JSON document \
but it could not be parsed. Reformat it as valid JSON. Respond with the JSON only, without \
explanations or code fences.\n\n";

/// Removes code fences and control characters, then trims the text to the
/// outermost JSON object or array.
///
/// ```rust
/// use graphrag_indexer::llm::clean_json_output;
///
/// let raw = "Here you go:\n```json\n{\"title\": \"x\"}\n```";
/// assert_eq!(clean_json_output(raw), "{\"title\": \"x\"}");
/// ```
pub fn clean_json_output(raw: &str) -> String {
    let without_fences: String = raw
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n");
    let cleaned: String = without_fences
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .collect();

    let start = cleaned.find(['{', '[']);
    let end = cleaned.rfind(['}', ']']);
    match (start, end) {
        (Some(start), Some(end)) if end > start => cleaned[start..=end].to_string(),
        _ => cleaned.trim().to_string(),
    }
}

fn parse(raw: &str) -> Result<Value, String> {
    serde_json::from_str::<Value>(raw)
        .or_else(|_| serde_json::from_str::<Value>(&clean_json_output(raw)))
        .map_err(|e| e.to_string())
}

/// Turns raw output into parsed JSON for requests that ask for it.
///
/// A parse failure triggers one corrective call asking the model to reformat
/// its own output. When a validator is present, generation is repeated (with
/// the cache lookup bypassed) until the validator accepts or the attempt
/// budget runs out.
pub struct JsonLlm {
    inner: Arc<dyn CompletionLlm>,
    max_attempts: u32,
}

impl JsonLlm {
    pub fn new(inner: Arc<dyn CompletionLlm>, max_attempts: u32) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
        }
    }

    async fn parse_or_reformat(
        &self,
        request: &CompletionRequest,
        response: &CompletionResponse,
    ) -> Result<Value, String> {
        let first_error = match parse(&response.output) {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        StructuredOutputRepair {
            operation: &request.name,
            attempt: 1,
            reason: &first_error,
        }
        .log();

        let mut reformat = CompletionRequest::new(
            format!("{}-reformat", request.name),
            format!("{}{}", REFORMAT_PROMPT, response.output),
        );
        reformat.json = true;
        reformat.model_parameters = request.model_parameters.clone();
        let repaired = self
            .inner
            .invoke(reformat)
            .await
            .map_err(|e| e.to_string())?;
        parse(&repaired.output)
    }
}

#[async_trait]
impl CompletionLlm for JsonLlm {
    async fn invoke(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        if !request.json {
            return self.inner.invoke(request).await;
        }

        let mut last_reason = String::from("no attempts made");
        for attempt in 1..=self.max_attempts {
            let mut current = request.clone();
            current.bypass_cache = request.bypass_cache || attempt > 1;
            let mut response = self.inner.invoke(current).await?;

            let value = match self.parse_or_reformat(&request, &response).await {
                Ok(value) => value,
                Err(reason) => {
                    last_reason = reason;
                    continue;
                }
            };

            if let Some(validator) = &request.json_validator {
                if !validator(&value) {
                    last_reason = "output failed validation".to_string();
                    StructuredOutputRepair {
                        operation: &request.name,
                        attempt,
                        reason: &last_reason,
                    }
                    .log();
                    continue;
                }
            }

            response.json = Some(value);
            return Ok(response);
        }

        Err(LlmError::StructuredOutput {
            name: request.name,
            reason: last_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::StaticLlm;
    use serde_json::json;

    #[test]
    fn test_clean_json_output() {
        let cases = vec![
            ("{\"a\": 1}", "{\"a\": 1}"),
            ("```json\n{\"a\": 1}\n```", "{\"a\": 1}"),
            ("prefix [1, 2] suffix", "[1, 2]"),
            ("{\"a\":\u{0007} 1}", "{\"a\": 1}"),
            ("no json here", "no json here"),
        ];
        for (raw, expected) in cases {
            assert_eq!(clean_json_output(raw), expected, "{:?}", raw);
        }
    }

    #[tokio::test]
    async fn test_fenced_output_is_parsed_without_repair() {
        let provider = Arc::new(StaticLlm::repeating(vec!["```json\n{\"ok\": true}\n```".into()]));
        let llm = JsonLlm::new(provider.clone(), DEFAULT_JSON_ATTEMPTS);

        let response = llm
            .invoke(CompletionRequest::new("report", "x").with_json())
            .await
            .unwrap();
        assert_eq!(response.json, Some(json!({"ok": true})));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_unparseable_output_gets_one_reformat_call() {
        let provider = Arc::new(StaticLlm::scripted(vec![
            Ok("title: broken".to_string()),
            Ok("{\"title\": \"fixed\"}".to_string()),
        ]));
        let llm = JsonLlm::new(provider.clone(), DEFAULT_JSON_ATTEMPTS);

        let response = llm
            .invoke(CompletionRequest::new("report", "x").with_json())
            .await
            .unwrap();
        assert_eq!(response.json, Some(json!({"title": "fixed"})));
        assert_eq!(provider.calls(), 2);
        assert!(provider.inputs()[1].starts_with("The following text"));
    }

    #[tokio::test]
    async fn test_validator_exhaustion_is_structured_output_error() {
        let provider = Arc::new(StaticLlm::repeating(vec!["{\"rating\": 1}".into()]));
        let llm = JsonLlm::new(provider.clone(), 3);
        let validator: crate::llm::JsonValidator = Arc::new(|v: &Value| v.get("title").is_some());

        let result = llm
            .invoke(CompletionRequest::new("report", "x").with_validator(validator))
            .await;
        assert!(matches!(result, Err(LlmError::StructuredOutput { .. })));
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_validator_retry_succeeds() {
        let provider = Arc::new(StaticLlm::repeating(vec![
            "{\"rating\": 1}".into(),
            "{\"title\": \"t\"}".into(),
        ]));
        let llm = JsonLlm::new(provider.clone(), 3);
        let validator: crate::llm::JsonValidator = Arc::new(|v: &Value| v.get("title").is_some());

        let response = llm
            .invoke(CompletionRequest::new("report", "x").with_validator(validator))
            .await
            .unwrap();
        assert_eq!(response.json, Some(json!({"title": "t"})));
    }

    #[tokio::test]
    async fn test_plain_requests_pass_through() {
        let provider = Arc::new(StaticLlm::repeating(vec!["not json".into()]));
        let llm = JsonLlm::new(provider, 3);
        let response = llm.invoke(CompletionRequest::new("t", "x")).await.unwrap();
        assert_eq!(response.output, "not json");
        assert!(response.json.is_none());
    }
}
