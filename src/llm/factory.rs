// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::cache::PipelineCache;
use crate::config::{LlmConfig, LlmType};
use crate::errors::LlmError;
use crate::limiting::{LimiterRegistry, LimiterSettings};
use crate::llm::{
    CachedLlm, CompletionLlm, HistoryLlm, InvocationCallback, JsonLlm, OpenAiChatLlm,
    RateLimitedLlm, RetryPolicy, RetryingLlm, StaticLlm, TemplateLlm,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

/// Run-scoped collaborators shared by every client a run builds.
#[derive(Clone)]
pub struct LlmServices {
    pub cache: Arc<dyn PipelineCache>,
    pub limiters: LimiterRegistry,
    pub on_invocation: Option<InvocationCallback>,
}

impl LlmServices {
    pub fn new(cache: Arc<dyn PipelineCache>) -> Self {
        Self {
            cache,
            limiters: LimiterRegistry::new(),
            on_invocation: None,
        }
    }

    pub fn with_invocation_callback(mut self, callback: InvocationCallback) -> Self {
        self.on_invocation = Some(callback);
        self
    }
}

/// Builds the full decorator stack over the provider named by `config`.
pub fn build_llm(
    config: &LlmConfig,
    services: &LlmServices,
) -> Result<Arc<dyn CompletionLlm>, LlmError> {
    let provider: Arc<dyn CompletionLlm> = match config.kind {
        LlmType::OpenaiChat => {
            let api_key = config
                .api_key
                .clone()
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| LlmError::Config("llm.api_key is required".to_string()))?;
            Arc::new(OpenAiChatLlm::new(
                api_key,
                config.api_base.clone(),
                default_parameters(config),
                config.model_supports_json,
                Duration::from_secs_f64(config.request_timeout),
            )?)
        }
        LlmType::Static => Arc::new(StaticLlm::repeating(config.static_responses.clone())),
    };
    build_llm_with_provider(provider, config, services)
}

/// Builds the decorator stack over an already constructed provider.
pub fn build_llm_with_provider(
    provider: Arc<dyn CompletionLlm>,
    config: &LlmConfig,
    services: &LlmServices,
) -> Result<Arc<dyn CompletionLlm>, LlmError> {
    let limiters = services.limiters.get_or_create(
        &config.model,
        &LimiterSettings {
            tokens_per_minute: config.tokens_per_minute,
            requests_per_minute: config.requests_per_minute,
            concurrent_requests: config.concurrent_requests,
        },
    );
    let policy = RetryPolicy {
        max_retries: config.max_retries,
        max_retry_wait: Duration::from_secs_f64(config.max_retry_wait),
        sleep_on_rate_limit_recommendation: config.sleep_on_rate_limit_recommendation,
        ..RetryPolicy::default()
    };
    let cache = services.cache.child(&config.model)?;

    let gated: Arc<dyn CompletionLlm> = Arc::new(RateLimitedLlm::new(provider, limiters));
    let retried: Arc<dyn CompletionLlm> = Arc::new(RetryingLlm::new(
        gated,
        policy,
        services.on_invocation.clone(),
    ));
    let cached: Arc<dyn CompletionLlm> =
        Arc::new(CachedLlm::new(retried, cache, default_parameters(config)));
    let tracked: Arc<dyn CompletionLlm> = Arc::new(HistoryLlm::new(cached));
    let templated: Arc<dyn CompletionLlm> = Arc::new(TemplateLlm::new(tracked));
    Ok(Arc::new(JsonLlm::new(templated, config.json_attempts)))
}

fn default_parameters(config: &LlmConfig) -> Map<String, Value> {
    let mut parameters = Map::new();
    parameters.insert("model".to_string(), json!(config.model));
    parameters.insert("temperature".to_string(), json!(config.temperature));
    if let Some(max_tokens) = config.max_tokens {
        parameters.insert("max_tokens".to_string(), json!(max_tokens));
    }
    if let Some(top_p) = config.top_p {
        parameters.insert("top_p".to_string(), json!(top_p));
    }
    parameters
}
