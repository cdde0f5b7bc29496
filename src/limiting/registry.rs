// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::limiting::{Limiter, NoopLimiter, RollingWindowLimiter};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Limits configured for one model identity. `None` or zero disables a limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LimiterSettings {
    pub tokens_per_minute: Option<u64>,
    pub requests_per_minute: Option<u64>,
    pub concurrent_requests: Option<usize>,
}

/// The limiters shared by every caller of one model identity.
pub struct LimiterSet {
    pub tokens: Arc<dyn Limiter>,
    pub requests: Arc<dyn Limiter>,
    pub concurrency: Option<Arc<Semaphore>>,
}

impl LimiterSet {
    fn from_settings(settings: &LimiterSettings) -> Self {
        Self {
            tokens: per_minute(settings.tokens_per_minute),
            requests: per_minute(settings.requests_per_minute),
            concurrency: settings
                .concurrent_requests
                .filter(|n| *n > 0)
                .map(|n| Arc::new(Semaphore::new(n))),
        }
    }
}

fn per_minute(limit: Option<u64>) -> Arc<dyn Limiter> {
    match limit.filter(|n| *n > 0) {
        Some(n) => Arc::new(RollingWindowLimiter::per_minute(n)),
        None => Arc::new(NoopLimiter),
    }
}

/// Limiter sets keyed by model identity.
///
/// The first lookup of an identity creates its set; later lookups return the
/// same set regardless of the settings passed, so concurrent first uses still
/// share one set. The only mutation is insert-if-absent.
#[derive(Clone, Default)]
pub struct LimiterRegistry {
    sets: Arc<DashMap<String, Arc<LimiterSet>>>,
}

impl LimiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, identity: &str, settings: &LimiterSettings) -> Arc<LimiterSet> {
        Arc::clone(
            self.sets
                .entry(identity.to_string())
                .or_insert_with(|| Arc::new(LimiterSet::from_settings(settings)))
                .value(),
        )
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_identity_shares_one_set() {
        let registry = LimiterRegistry::new();
        let settings = LimiterSettings {
            tokens_per_minute: Some(1000),
            requests_per_minute: Some(10),
            concurrent_requests: Some(2),
        };

        let a = registry.get_or_create("gpt-4o", &settings);
        let b = registry.get_or_create("gpt-4o", &LimiterSettings::default());
        let c = registry.get_or_create("gpt-4o-mini", &settings);

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(registry.len(), 2);
        assert_eq!(
            a.concurrency.as_ref().map(|s| s.available_permits()),
            Some(2)
        );
    }

    #[test]
    fn test_zero_limits_disable_gating() {
        let registry = LimiterRegistry::new();
        let set = registry.get_or_create(
            "local",
            &LimiterSettings {
                tokens_per_minute: Some(0),
                requests_per_minute: None,
                concurrent_requests: Some(0),
            },
        );
        assert!(set.concurrency.is_none());
    }
}
