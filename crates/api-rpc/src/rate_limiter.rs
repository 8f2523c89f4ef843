//! Rate Limiter (Token Bucket Algorithm)
//!
//! Tokens are kept in thousandths so slow refill rates still accrue between
//! calls. State is one packed u64 updated with a CAS loop:
//! upper 32 bits hold milli-tokens, lower 32 bits the last refill time in
//! milliseconds since the limiter was created.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

const MILLI: u64 = 1000;

pub struct RateLimiter {
    packed: AtomicU64,
    created: Instant,
    max_milli_tokens: u64,
    refill_per_sec: u64,
}

fn pack(milli_tokens: u64, at_ms: u32) -> u64 {
    (milli_tokens << 32) | at_ms as u64
}

fn unpack(packed: u64) -> (u64, u32) {
    (packed >> 32, (packed & 0xFFFF_FFFF) as u32)
}

impl RateLimiter {
    /// `burst` requests at once, refilled at `refill_per_sec`
    pub fn new(burst: u32, refill_per_sec: u32) -> Self {
        let max_milli_tokens = burst as u64 * MILLI;
        Self {
            packed: AtomicU64::new(pack(max_milli_tokens, 0)),
            created: Instant::now(),
            max_milli_tokens,
            refill_per_sec: refill_per_sec as u64,
        }
    }

    /// Consume one token. Returns false when throttled.
    pub fn check(&self) -> bool {
        loop {
            let current = self.packed.load(Ordering::Acquire);
            let (milli_tokens, last_ms) = unpack(current);

            // Wraps after ~49 days; a wrapped delta only refills early
            let now_ms = self.created.elapsed().as_millis() as u32;
            let delta_ms = now_ms.wrapping_sub(last_ms) as u64;

            // refill_per_sec tokens per 1000ms == refill_per_sec milli-tokens per ms
            let refilled = (milli_tokens + delta_ms * self.refill_per_sec).min(self.max_milli_tokens);

            let (next, allowed) = if refilled >= MILLI {
                (refilled - MILLI, true)
            } else {
                (refilled, false)
            };

            if self
                .packed
                .compare_exchange(current, pack(next, now_ms), Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return allowed;
            }
        }
    }

    /// Whole tokens currently available
    pub fn remaining(&self) -> u64 {
        unpack(self.packed.load(Ordering::Acquire)).0 / MILLI
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_allows_burst_then_throttles() {
        let limiter = RateLimiter::new(10, 1);
        for _ in 0..10 {
            assert!(limiter.check());
        }
        assert!(!limiter.check());
    }

    #[tokio::test]
    async fn test_refills_over_time() {
        let limiter = RateLimiter::new(5, 10);
        for _ in 0..5 {
            assert!(limiter.check());
        }
        assert!(!limiter.check());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(limiter.check());
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_the_bucket() {
        let limiter = Arc::new(RateLimiter::new(100, 1));

        let mut handles = vec![];
        for _ in 0..10 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                (0..20).filter(|_| limiter.check()).count()
            }));
        }

        let mut total = 0;
        for handle in handles {
            total += handle.await.unwrap();
        }
        // 200 attempts against a burst of 100 (plus at most a token of refill)
        assert!((100..=101).contains(&total), "allowed {}", total);
    }
}
