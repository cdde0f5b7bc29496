// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! OpenAI compatible chat completions provider.

use crate::errors::LlmError;
use crate::llm::{CompletionLlm, CompletionRequest, CompletionResponse, TokenUsage};
use async_trait::async_trait;
use regex::Regex;
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::OnceLock;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Raw provider at the bottom of the decorator stack.
///
/// Errors are classified for the retry layer: 429 is a rate limit (with the
/// provider's recommended wait when one can be found), 5xx is a server error,
/// transport failures are connection errors and everything else is final.
#[derive(Clone)]
pub struct OpenAiChatLlm {
    http_client: Client,
    api_key: String,
    api_base: String,
    supports_json: bool,
    parameters: Map<String, Value>,
}

impl OpenAiChatLlm {
    /// `parameters` must contain at least `model`; request parameters override them.
    pub fn new(
        api_key: impl Into<String>,
        api_base: Option<String>,
        parameters: Map<String, Value>,
        supports_json: bool,
        request_timeout: Duration,
    ) -> Result<Self, LlmError> {
        if !parameters.contains_key("model") {
            return Err(LlmError::Config("model parameter is required".to_string()));
        }
        let http_client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| LlmError::Config(e.to_string()))?;
        Ok(Self {
            http_client,
            api_key: api_key.into(),
            api_base: api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            supports_json,
            parameters,
        })
    }

    fn body(&self, request: &CompletionRequest) -> Value {
        let mut body = self.parameters.clone();
        for (key, value) in &request.model_parameters {
            body.insert(key.clone(), value.clone());
        }
        body.insert("messages".to_string(), json!(request.messages()));
        if request.json && self.supports_json {
            body.insert("response_format".to_string(), json!({"type": "json_object"}));
        }
        Value::Object(body)
    }
}

#[derive(Deserialize)]
struct ChatResponseRaw {
    choices: Vec<ChoiceRaw>,
    #[serde(default)]
    usage: Option<UsageRaw>,
}

#[derive(Deserialize)]
struct ChoiceRaw {
    message: ChatMessageRaw,
}

#[derive(Deserialize)]
struct ChatMessageRaw {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct UsageRaw {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[async_trait]
impl CompletionLlm for OpenAiChatLlm {
    async fn invoke(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&self.body(&request))
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &headers, text));
        }

        let raw: ChatResponseRaw = response
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;
        let output = raw
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::Decode("response contained no choices".to_string()))?;
        let usage = raw
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        tracing::debug!(
            name = %request.name,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "chat completion"
        );

        Ok(CompletionResponse {
            output,
            json: None,
            history: request.history,
            cache_hit: false,
            usage,
        })
    }
}

fn classify_failure(status: StatusCode, headers: &HeaderMap, message: String) -> LlmError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = retry_after_header(headers).or_else(|| retry_after_hint(&message));
        LlmError::RateLimited {
            message,
            retry_after,
        }
    } else if status.is_server_error() {
        LlmError::Server {
            status: status.as_u16(),
            message,
        }
    } else {
        LlmError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

fn retry_after_header(headers: &HeaderMap) -> Option<Duration> {
    if let Some(ms) = headers
        .get("retry-after-ms")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok())
    {
        return Some(Duration::from_secs_f64(ms.max(0.0) / 1000.0));
    }
    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok())
        .map(|secs| Duration::from_secs_f64(secs.max(0.0)))
}

/// Finds hints such as "Please retry after 20 seconds" in an error body.
pub(crate) fn retry_after_hint(message: &str) -> Option<Duration> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = PATTERN
        .get_or_init(|| Regex::new(r"(?i)(?:retry|try again) after (\d+(?:\.\d+)?) ?(ms|milliseconds?|s|sec|seconds?)?").ok())
        .as_ref()?;
    let captures = pattern.captures(message)?;
    let amount: f64 = captures.get(1)?.as_str().parse().ok()?;
    let millis = captures
        .get(2)
        .is_some_and(|unit| unit.as_str().to_ascii_lowercase().starts_with("m"));
    Some(if millis {
        Duration::from_secs_f64(amount / 1000.0)
    } else {
        Duration::from_secs_f64(amount)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_retry_after_hint() {
        let cases = vec![
            ("Rate limit reached. Please retry after 20 seconds.", Some(Duration::from_secs(20))),
            ("Try again after 1.5s", Some(Duration::from_millis(1500))),
            ("retry after 250 ms", Some(Duration::from_millis(250))),
            ("quota exceeded", None),
        ];
        for (message, expected) in cases {
            assert_eq!(retry_after_hint(message), expected, "{}", message);
        }
    }

    #[test]
    fn test_classify_failure() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("7"));

        let error = classify_failure(StatusCode::TOO_MANY_REQUESTS, &headers, "slow".into());
        assert_eq!(error.retry_after(), Some(Duration::from_secs(7)));
        assert!(error.is_retryable());

        let server = classify_failure(StatusCode::BAD_GATEWAY, &HeaderMap::new(), "".into());
        assert!(matches!(server, LlmError::Server { status: 502, .. }));

        let client = classify_failure(StatusCode::UNAUTHORIZED, &HeaderMap::new(), "".into());
        assert!(!client.is_retryable());
    }

    #[test]
    fn test_body_merges_parameters_and_json_mode() {
        let mut defaults = Map::new();
        defaults.insert("model".into(), json!("gpt-4o-mini"));
        defaults.insert("temperature".into(), json!(0.0));
        let llm = OpenAiChatLlm::new("key", None, defaults, true, Duration::from_secs(5)).unwrap();

        let request = CompletionRequest::new("extract", "hi")
            .with_json()
            .with_parameter("temperature", json!(0.5));
        let body = llm.body(&request);

        assert_eq!(body["model"], json!("gpt-4o-mini"));
        assert_eq!(body["temperature"], json!(0.5));
        assert_eq!(body["response_format"]["type"], json!("json_object"));
        assert_eq!(body["messages"][0]["role"], json!("user"));
        assert_eq!(body["messages"][0]["content"], json!("hi"));
    }

    #[test]
    fn test_model_is_required() {
        assert!(OpenAiChatLlm::new("k", None, Map::new(), false, Duration::from_secs(1)).is_err());
    }
}
