//! Explicit TTL key-value store used for remote reads, frontend views and the
//! rate-limit counter.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// Time source injected into the cache and the rate limiter so that window
/// and expiry logic stays testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// get / put-with-TTL / has, values stored as serialized JSON strings.
pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn put(&self, key: &str, value: String, ttl: Duration);
    fn has(&self, key: &str) -> bool;
}

struct CacheEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

pub struct MemoryCache {
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        MemoryCache {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap();

        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn put(&self, key: &str, value: String, ttl: Duration) {
        let expires_at = self.clock.now()
            + TimeDelta::from_std(ttl).unwrap_or_else(|_| TimeDelta::seconds(0));

        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), CacheEntry { value, expires_at });
    }

    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Advanceable clock for cache and rate-limit tests.
    pub struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        pub fn new(now: DateTime<Utc>) -> Self {
            ManualClock { now: Mutex::new(now) }
        }

        pub fn advance(&self, delta: TimeDelta) {
            let mut now = self.now.lock().unwrap();
            *now += delta;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    fn epoch() -> DateTime<Utc> {
        DateTime::from_timestamp(1_750_000_000, 0).unwrap()
    }

    #[test]
    fn returns_value_before_expiry() {
        let clock = Arc::new(ManualClock::new(epoch()));
        let cache = MemoryCache::new(clock.clone());

        cache.put("metro.lines.frontend", "[]".to_string(), Duration::from_secs(3600));

        clock.advance(TimeDelta::seconds(3599));
        assert_eq!(cache.get("metro.lines.frontend"), Some("[]".to_string()));
        assert!(cache.has("metro.lines.frontend"));
    }

    #[test]
    fn expires_after_ttl() {
        let clock = Arc::new(ManualClock::new(epoch()));
        let cache = MemoryCache::new(clock.clone());

        cache.put("wmata.predictions.A01", "[]".to_string(), Duration::from_secs(15));

        clock.advance(TimeDelta::seconds(16));
        assert_eq!(cache.get("wmata.predictions.A01"), None);
        assert!(!cache.has("wmata.predictions.A01"));
    }

    #[test]
    fn missing_key_is_absent() {
        let clock = Arc::new(ManualClock::new(epoch()));
        let cache = MemoryCache::new(clock);

        assert!(!cache.has("wmata.stations.all"));
    }

    #[test]
    fn put_overwrites_existing_entry() {
        let clock = Arc::new(ManualClock::new(epoch()));
        let cache = MemoryCache::new(clock);

        cache.put("k", "old".to_string(), Duration::from_secs(60));
        cache.put("k", "new".to_string(), Duration::from_secs(60));

        assert_eq!(cache.get("k"), Some("new".to_string()));
    }
}
