//! Rate limiting utilities

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use crate::ClientId;

/// Token-bucket rate limiter keyed by caller.
///
/// Each key gets `capacity` tokens, refilled in full every `refill_interval`.
#[derive(Debug)]
pub struct RateLimiter<K = ClientId> {
    capacity: u32,
    refill_interval: Duration,
    buckets: HashMap<K, Bucket>,
}

#[derive(Debug)]
struct Bucket {
    tokens: u32,
    last_refill: Instant,
}

impl<K: Eq + Hash + Clone> RateLimiter<K> {
    pub fn new(capacity: u32, refill_interval: Duration) -> Self {
        Self {
            capacity,
            refill_interval,
            buckets: HashMap::new(),
        }
    }

    /// Returns `true` if the request is allowed, `false` if rate limited
    pub fn check(&mut self, key: &K) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&mut self, key: &K, now: Instant) -> bool {
        let capacity = self.capacity;
        let bucket = self.buckets.entry(key.clone()).or_insert(Bucket {
            tokens: capacity,
            last_refill: now,
        });

        if now.duration_since(bucket.last_refill) >= self.refill_interval {
            bucket.tokens = capacity;
            bucket.last_refill = now;
        }

        match bucket.tokens.checked_sub(1) {
            Some(left) => {
                bucket.tokens = left;
                true
            }
            None => false,
        }
    }

    /// Forget a caller (e.g. on disconnect)
    pub fn remove(&mut self, key: &K) {
        self.buckets.remove(key);
    }

    /// Drop buckets that have not been refilled within `stale_after`
    pub fn cleanup(&mut self, stale_after: Duration) -> usize {
        let now = Instant::now();
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| now.duration_since(bucket.last_refill) < stale_after);
        before - self.buckets.len()
    }

    pub fn tracked(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_capacity() {
        let mut limiter = RateLimiter::new(5, Duration::from_secs(1));
        let client = ClientId::new();

        for _ in 0..5 {
            assert!(limiter.check(&client));
        }
        assert!(!limiter.check(&client));
    }

    #[test]
    fn buckets_are_per_client() {
        let mut limiter = RateLimiter::new(2, Duration::from_secs(1));
        let a = ClientId::new();
        let b = ClientId::new();

        assert!(limiter.check(&a));
        assert!(limiter.check(&a));
        assert!(!limiter.check(&a));

        assert!(limiter.check(&b));
        assert_eq!(limiter.tracked(), 2);
    }

    #[test]
    fn refills_after_interval() {
        let mut limiter: RateLimiter<&str> = RateLimiter::new(1, Duration::from_secs(1));
        let start = Instant::now();

        assert!(limiter.check_at(&"gateway", start));
        assert!(!limiter.check_at(&"gateway", start));
        assert!(limiter.check_at(&"gateway", start + Duration::from_secs(1)));
    }

    #[test]
    fn remove_and_cleanup() {
        let mut limiter = RateLimiter::new(1, Duration::from_secs(1));
        let client = ClientId::new();
        limiter.check(&client);
        limiter.remove(&client);
        assert_eq!(limiter.tracked(), 0);

        limiter.check(&client);
        assert_eq!(limiter.cleanup(Duration::ZERO), 1);
    }
}
