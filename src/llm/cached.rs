// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::cache::{cache_key, PipelineCache};
use crate::errors::LlmError;
use crate::llm::{CompletionLlm, CompletionRequest, CompletionResponse, TokenUsage};
use crate::observability::messages::llm::CacheHit;
use crate::observability::messages::StructuredLog;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Replays stored outputs for identical requests.
///
/// The key covers the operation tag, the input with its history, and the
/// effective parameters (client defaults overlaid with request overrides and
/// the JSON flag). A hit never reaches the wrapped client.
pub struct CachedLlm {
    inner: Arc<dyn CompletionLlm>,
    cache: Arc<dyn PipelineCache>,
    default_parameters: Map<String, Value>,
}

impl CachedLlm {
    pub fn new(
        inner: Arc<dyn CompletionLlm>,
        cache: Arc<dyn PipelineCache>,
        default_parameters: Map<String, Value>,
    ) -> Self {
        Self {
            inner,
            cache,
            default_parameters,
        }
    }

    fn key(&self, request: &CompletionRequest) -> String {
        let mut parameters = self.default_parameters.clone();
        for (name, value) in &request.model_parameters {
            parameters.insert(name.clone(), value.clone());
        }
        parameters.insert("json".to_string(), Value::Bool(request.json));

        let prompt = json!({"input": request.input, "history": request.history}).to_string();
        cache_key(&request.name, &prompt, &Value::Object(parameters))
    }
}

#[async_trait]
impl CompletionLlm for CachedLlm {
    async fn invoke(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let key = self.key(&request);

        if !request.bypass_cache {
            if let Some(Value::String(output)) = self.cache.get(&key).await? {
                CacheHit {
                    operation: &request.name,
                    key: &key,
                }
                .log();
                return Ok(CompletionResponse {
                    output,
                    json: None,
                    history: request.history,
                    cache_hit: true,
                    usage: TokenUsage::default(),
                });
            }
        }

        let name = request.name.clone();
        let input = request.input.clone();
        let response = self.inner.invoke(request).await?;

        let mut debug = Map::new();
        debug.insert("name".to_string(), Value::String(name));
        debug.insert("input".to_string(), Value::String(input));
        self.cache
            .set(&key, Some(Value::String(response.output.clone())), Some(debug))
            .await?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::llm::mock::StaticLlm;

    fn defaults() -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("model".into(), json!("m"));
        map
    }

    #[tokio::test]
    async fn test_cache_hit_never_calls_downstream() {
        let provider = Arc::new(StaticLlm::repeating(vec!["answer".into()]));
        let llm = CachedLlm::new(provider.clone(), Arc::new(MemoryCache::new()), defaults());

        let first = llm.invoke(CompletionRequest::new("chat", "q")).await.unwrap();
        let second = llm.invoke(CompletionRequest::new("chat", "q")).await.unwrap();

        assert!(!first.cache_hit);
        assert!(second.cache_hit);
        assert_eq!(second.output, "answer");
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_different_tags_params_or_history_miss() {
        let provider = Arc::new(StaticLlm::repeating(vec!["answer".into()]));
        let llm = CachedLlm::new(provider.clone(), Arc::new(MemoryCache::new()), defaults());

        let requests = vec![
            CompletionRequest::new("chat", "q"),
            CompletionRequest::new("summarize", "q"),
            CompletionRequest::new("chat", "q").with_parameter("temperature", json!(1)),
            CompletionRequest::new("chat", "q").with_json(),
            CompletionRequest::new("chat", "q")
                .with_history(vec![crate::llm::ChatMessage::system("be brief")]),
        ];
        for request in requests {
            llm.invoke(request).await.unwrap();
        }
        assert_eq!(provider.calls(), 5);
    }

    #[tokio::test]
    async fn test_bypass_skips_lookup_but_refreshes_entry() {
        let provider = Arc::new(StaticLlm::repeating(vec!["one".into(), "two".into()]));
        let llm = CachedLlm::new(provider.clone(), Arc::new(MemoryCache::new()), defaults());

        llm.invoke(CompletionRequest::new("chat", "q")).await.unwrap();
        let mut fresh = CompletionRequest::new("chat", "q");
        fresh.bypass_cache = true;
        assert_eq!(llm.invoke(fresh).await.unwrap().output, "two");

        let cached = llm.invoke(CompletionRequest::new("chat", "q")).await.unwrap();
        assert!(cached.cache_hit);
        assert_eq!(cached.output, "two");
    }
}
