// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Offline provider that answers from a script instead of the network.
//!
//! Used by the `static` model type for dry runs and throughout the tests.

use crate::errors::LlmError;
use crate::llm::{estimate_tokens, CompletionLlm, CompletionRequest, CompletionResponse, TokenUsage};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type Responder = dyn Fn(&CompletionRequest, usize) -> Result<String, LlmError> + Send + Sync;

pub struct StaticLlm {
    responder: Box<Responder>,
    calls: AtomicUsize,
    inputs: Mutex<Vec<String>>,
}

impl StaticLlm {
    /// Answers with `responder(request, call_index)`.
    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&CompletionRequest, usize) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
            inputs: Mutex::new(Vec::new()),
        }
    }

    /// Cycles through `responses`; an empty list answers with an empty string.
    pub fn repeating(responses: Vec<String>) -> Self {
        Self::from_fn(move |_, call| {
            Ok(responses
                .get(call % responses.len().max(1))
                .cloned()
                .unwrap_or_default())
        })
    }

    /// Plays `script` once, in order; calls past its end fail.
    pub fn scripted(script: Vec<Result<String, LlmError>>) -> Self {
        let script = Arc::new(Mutex::new(VecDeque::from(script)));
        Self::from_fn(move |_, _| {
            script
                .lock()
                .map_err(|_| LlmError::Config("script lock poisoned".to_string()))?
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::Decode("static script exhausted".to_string())))
        })
    }

    /// Fails every call with a fresh error from `error`.
    pub fn failing<F>(error: F) -> Self
    where
        F: Fn() -> LlmError + Send + Sync + 'static,
    {
        Self::from_fn(move |_, _| Err(error()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Inputs received so far, in call order.
    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().map(|i| i.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CompletionLlm for StaticLlm {
    async fn invoke(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut inputs) = self.inputs.lock() {
            inputs.push(request.input.clone());
        }
        let output = (self.responder)(&request, call)?;
        let usage = TokenUsage {
            input_tokens: estimate_tokens(&request.input),
            output_tokens: estimate_tokens(&output),
        };
        Ok(CompletionResponse {
            output,
            json: None,
            history: request.history,
            cache_hit: false,
            usage,
        })
    }
}
