//! Per-provider call spacing
//!
//! Each provider owns one limiter. A caller reserves the next free slot
//! under the lock and sleeps outside it, so concurrent callers queue up
//! one spacing apart instead of racing.

use parking_lot::Mutex;
use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Default jitter fraction applied to the base spacing
pub const DEFAULT_JITTER: f64 = 0.1;

/// Minimum spacing between consecutive calls, with random jitter
#[derive(Debug)]
pub struct RateLimiter {
    base: Duration,
    jitter: f64,
    last_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            jitter: DEFAULT_JITTER,
            last_slot: Mutex::new(None),
        }
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    /// One spacing sample in `[base * (1 - jitter), base * (1 + jitter)]`
    pub fn spacing(&self) -> Duration {
        if self.jitter == 0.0 || self.base.is_zero() {
            return self.base;
        }
        let factor = rand::thread_rng().gen_range((1.0 - self.jitter)..=(1.0 + self.jitter));
        self.base.mul_f64(factor)
    }

    /// Wait until a call may start; returns how long the caller waited
    pub async fn acquire(&self) -> Duration {
        let wait = {
            let mut last = self.last_slot.lock();
            let now = Instant::now();
            let slot = match *last {
                Some(prev) => (prev + self.spacing()).max(now),
                None => now,
            };
            *last = Some(slot);
            slot.saturating_duration_since(now)
        };

        if !wait.is_zero() {
            debug!("Rate limiter waiting {:?}", wait);
            tokio::time::sleep(wait).await;
        }
        wait
    }
}
