// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::LlmError;
use crate::limiting::LimiterSet;
use crate::llm::tokens::{estimate_message_tokens, estimate_tokens};
use crate::llm::{CompletionLlm, CompletionRequest, CompletionResponse};
use async_trait::async_trait;
use std::sync::Arc;

/// Gates every call on the model identity's limiters.
///
/// Holds a concurrency permit for the duration of the call, takes one unit
/// of request budget and the estimated input tokens before the call, and the
/// output tokens after it.
pub struct RateLimitedLlm {
    inner: Arc<dyn CompletionLlm>,
    limiters: Arc<LimiterSet>,
}

impl RateLimitedLlm {
    pub fn new(inner: Arc<dyn CompletionLlm>, limiters: Arc<LimiterSet>) -> Self {
        Self { inner, limiters }
    }
}

#[async_trait]
impl CompletionLlm for RateLimitedLlm {
    async fn invoke(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let _permit = match &self.limiters.concurrency {
            Some(semaphore) => Some(
                Arc::clone(semaphore)
                    .acquire_owned()
                    .await
                    .map_err(|_| LlmError::Config("concurrency gate closed".to_string()))?,
            ),
            None => None,
        };

        self.limiters.requests.acquire(1).await;
        let input_tokens = estimate_message_tokens(&request.history) + estimate_tokens(&request.input);
        self.limiters.tokens.acquire(input_tokens).await;

        let response = self.inner.invoke(request).await?;

        let output_tokens = match response.usage.output_tokens {
            0 => estimate_tokens(&response.output),
            n => n,
        };
        self.limiters.tokens.acquire(output_tokens).await;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiting::{LimiterRegistry, LimiterSettings};
    use crate::llm::mock::StaticLlm;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    struct SlowLlm {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl CompletionLlm for SlowLlm {
        async fn invoke(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(CompletionResponse::new(request.input))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_bounded_per_identity() {
        let registry = LimiterRegistry::new();
        let limiters = registry.get_or_create(
            "model",
            &LimiterSettings {
                concurrent_requests: Some(2),
                ..Default::default()
            },
        );
        let slow = Arc::new(SlowLlm {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let llm = Arc::new(RateLimitedLlm::new(slow.clone(), limiters));

        let calls = (0..6).map(|i| {
            let llm = Arc::clone(&llm);
            tokio::spawn(async move { llm.invoke(CompletionRequest::new("t", i.to_string())).await })
        });
        for call in futures::future::join_all(calls).await {
            call.unwrap().unwrap();
        }
        assert_eq!(slow.peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_per_minute_gate_each_call() {
        let registry = LimiterRegistry::new();
        let limiters = registry.get_or_create(
            "model",
            &LimiterSettings {
                requests_per_minute: Some(2),
                ..Default::default()
            },
        );
        let llm = RateLimitedLlm::new(Arc::new(StaticLlm::repeating(vec!["ok".into()])), limiters);

        let started = Instant::now();
        for _ in 0..3 {
            llm.invoke(CompletionRequest::new("t", "x")).await.unwrap();
        }
        assert!(started.elapsed() >= Duration::from_secs(60));
    }
}
