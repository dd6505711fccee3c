use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// Per-key minimum interval between runs.
///
/// Owned by whoever needs it and passed in, so separate limiters never share state.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last_run: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_run: Mutex::new(HashMap::new()),
        }
    }

    /// True (and record the run) when `key` last ran at least `interval` ago
    pub fn check_and_set(&self, key: &str) -> bool {
        self.check_and_set_at(key, Utc::now())
    }

    pub fn check_and_set_at(&self, key: &str, now: DateTime<Utc>) -> bool {
        let mut last_run = self.last_run.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(last) = last_run.get(key) {
            if now - *last < self.interval {
                log::debug!("Skipping {}: ran {}s ago", key, (now - *last).num_seconds());
                return false;
            }
        }

        last_run.insert(key.to_string(), now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_per_key() {
        let limiter = RateLimiter::new(Duration::minutes(10));
        let start = Utc::now();

        assert!(limiter.check_and_set_at("subscription", start));
        assert!(!limiter.check_and_set_at("subscription", start + Duration::minutes(5)));
        assert!(limiter.check_and_set_at("geo", start + Duration::minutes(5)));
        assert!(limiter.check_and_set_at("subscription", start + Duration::minutes(10)));
    }

    #[test]
    fn test_second_call_is_limited() {
        let limiter = RateLimiter::new(Duration::hours(1));
        assert!(limiter.check_and_set("update"));
        assert!(!limiter.check_and_set("update"));
    }

    #[test]
    fn test_limiters_are_independent() {
        let a = RateLimiter::new(Duration::hours(1));
        let b = RateLimiter::new(Duration::hours(1));
        assert!(a.check_and_set("k"));
        assert!(b.check_and_set("k"));
    }
}
