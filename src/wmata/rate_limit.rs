//! Rolling hourly request-count limiter backed by the shared cache.
//!
//! The counter key is derived from the fixed hour window the current instant
//! falls into, and each write carries a TTL equal to the remainder of that
//! window, so the count resets on its own at the window boundary.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{Cache, Clock};
use crate::error::WmataError;

const WINDOW_SECS: i64 = 3600;

pub struct HourlyRateLimiter {
    cache: Arc<dyn Cache>,
    clock: Arc<dyn Clock>,
    max_requests_per_hour: u32,
}

impl HourlyRateLimiter {
    pub fn new(cache: Arc<dyn Cache>, clock: Arc<dyn Clock>, max_requests_per_hour: u32) -> Self {
        HourlyRateLimiter {
            cache,
            clock,
            max_requests_per_hour,
        }
    }

    /// Fails fast when the current window is at the ceiling; no request may
    /// be sent in that case.
    pub fn check(&self) -> Result<(), WmataError> {
        if self.current_count() >= self.max_requests_per_hour {
            return Err(WmataError::RateLimitExceeded);
        }

        Ok(())
    }

    /// Bumps the counter after a request went out, TTL reset to what is left
    /// of the window.
    pub fn record_request(&self) {
        let now = self.clock.now().timestamp();
        let count = self.current_count() + 1;
        let remaining = WINDOW_SECS - now.rem_euclid(WINDOW_SECS);

        self.cache.put(
            &self.window_key(),
            count.to_string(),
            Duration::from_secs(remaining as u64),
        );
    }

    pub fn current_count(&self) -> u32 {
        self.cache
            .get(&self.window_key())
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(0)
    }

    pub fn max_requests_per_hour(&self) -> u32 {
        self.max_requests_per_hour
    }

    fn window_key(&self) -> String {
        let window = self.clock.now().timestamp().div_euclid(WINDOW_SECS);
        format!("wmata.rate_limit.{window}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::tests::ManualClock;
    use crate::cache::MemoryCache;
    use chrono::{DateTime, TimeDelta, Utc};

    fn limiter_with(max: u32) -> (HourlyRateLimiter, Arc<ManualClock>) {
        // 100 seconds into an hour window
        let start = DateTime::<Utc>::from_timestamp(1_750_000_000 - 1_750_000_000 % 3600 + 100, 0)
            .unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let cache = Arc::new(MemoryCache::new(clock.clone()));

        (HourlyRateLimiter::new(cache, clock.clone(), max), clock)
    }

    #[test]
    fn allows_requests_below_the_ceiling() {
        let (limiter, _clock) = limiter_with(3);

        for _ in 0..3 {
            limiter.check().unwrap();
            limiter.record_request();
        }

        assert_eq!(limiter.current_count(), 3);
    }

    #[test]
    fn fails_fast_at_the_ceiling() {
        let (limiter, _clock) = limiter_with(2);

        limiter.record_request();
        limiter.record_request();

        assert!(matches!(
            limiter.check(),
            Err(WmataError::RateLimitExceeded)
        ));
    }

    #[test]
    fn counter_resets_after_the_window() {
        let (limiter, clock) = limiter_with(1);

        limiter.record_request();
        assert!(limiter.check().is_err());

        clock.advance(TimeDelta::seconds(3600));

        assert_eq!(limiter.current_count(), 0);
        assert!(limiter.check().is_ok());
    }
}
