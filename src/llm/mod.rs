// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Resilient model client.
//!
//! A raw provider is wrapped in a chain of decorators, each a
//! [`CompletionLlm`] holding the next one. [`build_llm`] assembles the chain,
//! outermost first:
//!
//! 1. [`JsonLlm`] - JSON parsing, one corrective reformat call, validator retries
//! 2. [`TemplateLlm`] - `{variable}` substitution in input and system history
//! 3. [`HistoryLlm`] - appends each exchange to the returned history
//! 4. [`CachedLlm`] - content-addressed response cache
//! 5. [`RetryingLlm`] - exponential backoff over retryable errors
//! 6. [`RateLimitedLlm`] - concurrency permit, request and token budgets per attempt
//! 7. the provider ([`OpenAiChatLlm`] or [`StaticLlm`])
//!
//! Cache hits therefore never touch the limiters, and the limiters gate every
//! retry attempt.

mod cached;
mod factory;
mod history;
mod json;
pub mod mock;
mod openai;
mod rate_limited;
mod retry;
mod template;
mod tokens;
mod types;

pub use cached::CachedLlm;
pub use factory::{build_llm, build_llm_with_provider, LlmServices};
pub use history::HistoryLlm;
pub use json::{clean_json_output, JsonLlm};
pub use mock::StaticLlm;
pub use openai::OpenAiChatLlm;
pub use rate_limited::RateLimitedLlm;
pub use retry::{RetryPolicy, RetryingLlm};
pub use template::{substitute, TemplateLlm};
pub use tokens::estimate_tokens;
pub use types::{
    ChatMessage, CompletionRequest, CompletionResponse, InvocationCallback, InvocationRecord,
    JsonValidator, Role, TokenUsage,
};

use crate::errors::LlmError;
use async_trait::async_trait;

#[async_trait]
pub trait CompletionLlm: Send + Sync {
    async fn invoke(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}
