//! Client-side sliding-window rate limiter.
//!
//! At most `max_calls` acquisitions in any rolling `period`. One instance is
//! shared by every worker; the lock is released before sleeping.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

pub struct SlidingWindowLimiter {
    max_calls: usize,
    period: Duration,
    window: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new(max_calls: usize, period: Duration) -> Self {
        Self {
            max_calls: max_calls.max(1),
            period,
            window: Mutex::new(VecDeque::with_capacity(max_calls)),
        }
    }

    /// Wait until a call slot is free, then claim it
    pub async fn acquire(&self) {
        loop {
            let wait = match self.try_acquire_at(Instant::now()) {
                None => return,
                Some(wait) => wait,
            };
            debug!("Rate limit reached, waiting {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// Claim a slot if one is free; otherwise return how long until the oldest expires
    fn try_acquire_at(&self, now: Instant) -> Option<Duration> {
        let mut window = self.window.lock().unwrap_or_else(|poisoned| {
            tracing::error!("Rate limiter lock poisoned, recovering");
            poisoned.into_inner()
        });

        while window
            .front()
            .is_some_and(|t| now.duration_since(*t) >= self.period)
        {
            window.pop_front();
        }

        if window.len() < self.max_calls {
            window.push_back(now);
            return None;
        }

        let oldest = *window.front()?;
        Some(
            self.period
                .saturating_sub(now.duration_since(oldest))
                .max(Duration::from_millis(1)),
        )
    }
}
