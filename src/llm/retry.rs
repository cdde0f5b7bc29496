// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::LlmError;
use crate::llm::{
    CompletionLlm, CompletionRequest, CompletionResponse, InvocationCallback, InvocationRecord,
};
use crate::observability::messages::llm::{RetriesExhausted, RetryScheduled};
use crate::observability::messages::StructuredLog;
use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_retries: u32,
    /// Upper bound for any single sleep between attempts.
    pub max_retry_wait: Duration,
    /// Sleep for the provider's recommended delay on rate-limit errors.
    pub sleep_on_rate_limit_recommendation: bool,
    pub initial_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            max_retry_wait: Duration::from_secs(10),
            sleep_on_rate_limit_recommendation: true,
            initial_interval: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval.min(self.max_retry_wait))
            .with_max_interval(self.max_retry_wait)
            .with_randomization_factor(0.5)
            .with_multiplier(2.0)
            .with_max_elapsed_time(None)
            .build()
    }
}

/// Retries retryable failures of the wrapped client with exponential backoff
/// and jitter, then reports an [`InvocationRecord`] for the whole call.
pub struct RetryingLlm {
    inner: Arc<dyn CompletionLlm>,
    policy: RetryPolicy,
    on_invocation: Option<InvocationCallback>,
}

impl RetryingLlm {
    pub fn new(
        inner: Arc<dyn CompletionLlm>,
        policy: RetryPolicy,
        on_invocation: Option<InvocationCallback>,
    ) -> Self {
        Self {
            inner,
            policy,
            on_invocation,
        }
    }

    fn delay_for(&self, error: &LlmError, backoff: &mut ExponentialBackoff) -> Duration {
        let recommended = error
            .retry_after()
            .filter(|_| self.policy.sleep_on_rate_limit_recommendation);
        recommended
            .or_else(|| backoff.next_backoff())
            .unwrap_or(self.policy.max_retry_wait)
            .min(self.policy.max_retry_wait)
    }

    fn report(&self, record: InvocationRecord) {
        tracing::debug!(
            name = %record.name,
            attempts = record.attempts,
            total_ms = record.total_time.as_millis() as u64,
            input_tokens = record.input_tokens,
            output_tokens = record.output_tokens,
            succeeded = record.succeeded,
            "model invocation"
        );
        if let Some(callback) = &self.on_invocation {
            callback(&record);
        }
    }
}

#[async_trait]
impl CompletionLlm for RetryingLlm {
    async fn invoke(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let max_retries = self.policy.max_retries.max(1);
        let mut backoff = self.policy.backoff();
        let started = Instant::now();
        let mut attempt_times = Vec::new();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let attempt_started = Instant::now();
            let result = self.inner.invoke(request.clone()).await;
            attempt_times.push(attempt_started.elapsed());

            let error = match result {
                Ok(response) => {
                    self.report(InvocationRecord {
                        name: request.name.clone(),
                        attempts: attempt,
                        total_time: started.elapsed(),
                        attempt_times,
                        input_tokens: response.usage.input_tokens,
                        output_tokens: response.usage.output_tokens,
                        succeeded: true,
                    });
                    return Ok(response);
                }
                Err(error) => error,
            };

            let exhausted = attempt >= max_retries;
            if !error.is_retryable() || exhausted {
                self.report(InvocationRecord {
                    name: request.name.clone(),
                    attempts: attempt,
                    total_time: started.elapsed(),
                    attempt_times,
                    input_tokens: 0,
                    output_tokens: 0,
                    succeeded: false,
                });
                if !error.is_retryable() {
                    return Err(error);
                }
                RetriesExhausted {
                    operation: &request.name,
                    attempts: attempt,
                }
                .log();
                return Err(LlmError::RetriesExhausted {
                    operation: request.name.clone(),
                    attempts: attempt,
                    last_error: Box::new(error),
                });
            }

            let delay = self.delay_for(&error, &mut backoff);
            RetryScheduled {
                operation: &request.name,
                attempt,
                max_retries,
                delay,
                error: &error.to_string(),
            }
            .log();
            tokio::time::sleep(delay).await;
        }
    }
}
