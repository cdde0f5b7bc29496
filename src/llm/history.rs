// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::LlmError;
use crate::llm::{ChatMessage, CompletionLlm, CompletionRequest, CompletionResponse};
use async_trait::async_trait;
use std::sync::Arc;

/// Returns the conversation extended with this exchange so callers can
/// continue it (gleaning, claim continuation).
pub struct HistoryLlm {
    inner: Arc<dyn CompletionLlm>,
}

impl HistoryLlm {
    pub fn new(inner: Arc<dyn CompletionLlm>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl CompletionLlm for HistoryLlm {
    async fn invoke(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let mut history = request.history.clone();
        history.push(ChatMessage::user(request.input.clone()));

        let mut response = self.inner.invoke(request).await?;
        history.push(ChatMessage::assistant(response.output.clone()));
        response.history = history;
        Ok(response)
    }
}
