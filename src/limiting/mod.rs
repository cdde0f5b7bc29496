// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Rate and concurrency limiting for model calls.
//!
//! [`Limiter::acquire`] suspends until the requested weight fits and never
//! fails for capacity reasons. [`LimiterRegistry`] hands out one limiter set
//! per model identity for as long as the registry lives.

mod registry;
mod window;

pub use registry::{LimiterRegistry, LimiterSet, LimiterSettings};
pub use window::RollingWindowLimiter;

use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Limiter: Send + Sync {
    /// Waits until `weight` units are available and consumes them.
    async fn acquire(&self, weight: u64);
}

/// Always grants immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLimiter;

#[async_trait]
impl Limiter for NoopLimiter {
    async fn acquire(&self, _weight: u64) {}
}

/// Grants only when every inner limiter has granted, acquiring in order.
#[derive(Clone, Default)]
pub struct CompositeLimiter {
    limiters: Vec<Arc<dyn Limiter>>,
}

impl CompositeLimiter {
    pub fn new(limiters: Vec<Arc<dyn Limiter>>) -> Self {
        Self { limiters }
    }
}

#[async_trait]
impl Limiter for CompositeLimiter {
    async fn acquire(&self, weight: u64) {
        for limiter in &self.limiters {
            limiter.acquire(weight).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_composite_waits_for_the_strictest_limiter() {
        let loose: Arc<dyn Limiter> =
            Arc::new(RollingWindowLimiter::new(100, Duration::from_secs(60)));
        let strict: Arc<dyn Limiter> =
            Arc::new(RollingWindowLimiter::new(2, Duration::from_secs(60)));
        let composite = CompositeLimiter::new(vec![loose, strict]);

        let start = Instant::now();
        composite.acquire(1).await;
        composite.acquire(1).await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        composite.acquire(1).await;
        assert!(start.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_noop_never_blocks() {
        let limiter = NoopLimiter;
        for _ in 0..1000 {
            limiter.acquire(u64::MAX).await;
        }
    }
}
