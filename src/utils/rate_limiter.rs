use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::RwLock;

/// Per-app token bucket gating how often a lost task may trigger a
/// scaling action.
///
/// Buckets are installed when an app is started or upgraded and retired
/// with the app. An app without a bucket is permitted: a fresh leader
/// that has not yet seen the app must not suppress its first rescale.
#[derive(Debug, Default)]
pub struct ScalingRateLimiter {
    buckets: RwLock<HashMap<String, TokenBucket>>,
}

#[derive(Debug)]
struct TokenBucket {
    rate_per_sec: f64,
    capacity: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(rate_per_sec: f64) -> Self {
        let rate_per_sec = rate_per_sec.max(0.0);
        let capacity = rate_per_sec.max(1.0);
        Self {
            rate_per_sec,
            capacity,
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    fn try_acquire(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate_per_sec).min(self.capacity);
        self.last_refill = now;
    }
}

impl ScalingRateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Establish (or replace) the bucket for an app.
    pub async fn set_permits(&self, app_id: &str, rate_per_sec: f64) {
        let mut buckets = self.buckets.write().await;
        buckets.insert(app_id.to_string(), TokenBucket::new(rate_per_sec));
    }

    /// Consume a token for the app if one is available.
    pub async fn try_acquire(&self, app_id: &str) -> bool {
        let mut buckets = self.buckets.write().await;
        match buckets.get_mut(app_id) {
            Some(bucket) => bucket.try_acquire(),
            None => {
                tracing::debug!(app_id, "no rate limit configured; permitting");
                true
            }
        }
    }

    /// Retire the bucket for an app that is being destroyed.
    pub async fn remove(&self, app_id: &str) {
        self.buckets.write().await.remove(app_id);
    }
}
