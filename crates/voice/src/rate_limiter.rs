//! Per-client-id audio rate limiter (§4.7)
//!
//! Bucket of 100 tokens, refilled in full once per 1-second window.
//! Overflow within a window is a silent drop.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use whispr_core::types::ClientId;

pub const BUCKET_CAPACITY: u32 = 100;
const WINDOW: Duration = Duration::from_secs(1);

struct Bucket {
    window_start: Instant,
    consumed: u32,
}

pub struct RateLimiter {
    buckets: DashMap<ClientId, Bucket>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self { buckets: DashMap::new() }
    }

    /// Consumes one token for `client_id`. Returns `false` if the bucket is
    /// exhausted for the current window.
    pub fn allow(&self, client_id: ClientId) -> bool {
        let mut entry = self.buckets.entry(client_id).or_insert_with(|| Bucket {
            window_start: Instant::now(),
            consumed: 0,
        });

        if entry.window_start.elapsed() >= WINDOW {
            entry.window_start = Instant::now();
            entry.consumed = 0;
        }

        if entry.consumed >= BUCKET_CAPACITY {
            false
        } else {
            entry.consumed += 1;
            true
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_capacity_within_a_window() {
        let limiter = RateLimiter::new();
        let client = ClientId(1);
        for _ in 0..BUCKET_CAPACITY {
            assert!(limiter.allow(client));
        }
        assert!(!limiter.allow(client));
    }

    #[test]
    fn distinct_clients_have_independent_buckets() {
        let limiter = RateLimiter::new();
        for _ in 0..BUCKET_CAPACITY {
            limiter.allow(ClientId(1));
        }
        assert!(!limiter.allow(ClientId(1)));
        assert!(limiter.allow(ClientId(2)));
    }

    #[tokio::test]
    async fn bucket_refills_after_window_elapses() {
        let limiter = RateLimiter::new();
        let client = ClientId(7);
        for _ in 0..BUCKET_CAPACITY {
            limiter.allow(client);
        }
        assert!(!limiter.allow(client));

        tokio::time::pause();
        tokio::time::advance(WINDOW + Duration::from_millis(1)).await;

        assert!(limiter.allow(client));
    }
}
