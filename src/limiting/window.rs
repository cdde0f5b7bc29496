// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::limiting::Limiter;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Grants at most `capacity` weight inside any window of length `period`.
///
/// Past grants are remembered with their timestamp; capacity comes back as
/// each grant ages out of the window. Waiters are served in arrival order.
/// A request larger than the capacity is clamped to the capacity.
pub struct RollingWindowLimiter {
    capacity: u64,
    period: Duration,
    grants: Mutex<VecDeque<(Instant, u64)>>,
}

impl RollingWindowLimiter {
    pub fn new(capacity: u64, period: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            period,
            grants: Mutex::new(VecDeque::new()),
        }
    }

    /// `per_minute` units per rolling minute.
    pub fn per_minute(per_minute: u64) -> Self {
        Self::new(per_minute, Duration::from_secs(60))
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }
}

#[async_trait]
impl Limiter for RollingWindowLimiter {
    async fn acquire(&self, weight: u64) {
        let weight = weight.clamp(1, self.capacity);
        // Held across the sleep so waiters queue fairly behind each other.
        let mut grants = self.grants.lock().await;
        loop {
            let now = Instant::now();
            while let Some(&(granted_at, _)) = grants.front() {
                if now.duration_since(granted_at) >= self.period {
                    grants.pop_front();
                } else {
                    break;
                }
            }

            let used: u64 = grants.iter().map(|(_, w)| *w).sum();
            if used + weight <= self.capacity {
                grants.push_back((now, weight));
                return;
            }

            let mut to_free = used + weight - self.capacity;
            let mut wake_at = now;
            for &(granted_at, w) in grants.iter() {
                wake_at = granted_at + self.period;
                if w >= to_free {
                    break;
                }
                to_free -= w;
            }
            tokio::time::sleep_until(wake_at).await;
        }
    }
}
