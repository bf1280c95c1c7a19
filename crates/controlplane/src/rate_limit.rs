//! Per-identity token-bucket rate limiting with continuous refill.
//!
//! Each identity gets its own bucket in a sharded concurrent map; there is no
//! global lock on the hot path, only the per-entry lock `DashMap` takes while
//! an entry is being read or mutated.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// A tenant's rate-limit tier. Determines which preset bucket parameters apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Standard,
    Professional,
    Unlimited,
    Dev,
}

/// Capacity and refill rate for a tier, derived from its requests-per-minute preset.
#[derive(Debug, Clone, Copy)]
pub struct TierPreset {
    pub capacity: f64,
    pub refill_rate_per_second: f64,
}

impl Tier {
    #[must_use]
    pub fn preset(self) -> TierPreset {
        let per_minute: f64 = match self {
            Self::Free => 60.0,
            Self::Standard => 600.0,
            Self::Professional => 600.0,
            Self::Unlimited => 10_000.0,
            Self::Dev => 100_000.0,
        };
        TierPreset {
            capacity: per_minute / 10.0,
            refill_rate_per_second: per_minute / 60.0,
        }
    }
}

struct RateBucket {
    tokens: f64,
    capacity: f64,
    refill_rate_per_second: f64,
    last_refill_at: Instant,
}

impl RateBucket {
    fn new(preset: TierPreset) -> Self {
        Self {
            // Buckets are created full: the very first request consumes from
            // initial capacity, not from zero.
            tokens: preset.capacity,
            capacity: preset.capacity,
            refill_rate_per_second: preset.refill_rate_per_second,
            last_refill_at: Instant::now(),
        }
    }

    /// Refills then attempts to consume a single token.
    ///
    /// Returns `Ok(())` on success, or `Err(retry_after_seconds)` on denial.
    fn try_consume(&mut self) -> Result<(), u64> {
        let now = Instant::now();
        let delta_seconds = now.duration_since(self.last_refill_at).as_secs_f64();
        self.tokens = (self.tokens + delta_seconds * self.refill_rate_per_second).min(self.capacity);
        self.last_refill_at = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let deficit = 1.0 - self.tokens;
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let retry_after = (deficit / self.refill_rate_per_second).ceil() as u64;
            Err(retry_after.max(1))
        }
    }
}

/// Sharded map of per-identity token buckets.
///
/// Buckets are created lazily on first request from an identity, using the
/// tier preset passed at that time; the tier is not re-resolved afterwards.
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<DashMap<String, RateBucket>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buckets: Arc::new(DashMap::new()),
        }
    }

    /// Attempts to consume one token for `identity`, creating its bucket
    /// (full, sized per `tier`) on first use.
    ///
    /// Returns `Ok(())` on success, or `Err(retry_after_seconds)` on denial.
    pub fn check(&self, identity: &str, tier: Tier) -> Result<(), u64> {
        let mut entry = self
            .buckets
            .entry(identity.to_owned())
            .or_insert_with(|| RateBucket::new(tier.preset()));
        entry.value_mut().try_consume()
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
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn first_request_consumes_from_full_initial_capacity() {
        let limiter = RateLimiter::new();
        assert!(limiter.check("tenant-a", Tier::Free).is_ok());
    }

    #[test]
    fn exhausting_capacity_denies_with_retry_after() {
        let limiter = RateLimiter::new();
        // free tier: capacity = 6
        for _ in 0..6 {
            assert!(limiter.check("tenant-a", Tier::Free).is_ok());
        }
        let err = limiter.check("tenant-a", Tier::Free).unwrap_err();
        assert!(err >= 1);
    }

    #[test]
    fn distinct_identities_have_independent_buckets() {
        let limiter = RateLimiter::new();
        for _ in 0..6 {
            assert!(limiter.check("tenant-a", Tier::Free).is_ok());
        }
        assert!(limiter.check("tenant-b", Tier::Free).is_ok());
    }

    #[test]
    fn tokens_refill_over_time() {
        let limiter = RateLimiter::new();
        for _ in 0..6 {
            assert!(limiter.check("tenant-a", Tier::Free).is_ok());
        }
        assert!(limiter.check("tenant-a", Tier::Free).is_err());
        // free tier refills 1 token/sec; sleeping past that should allow one more.
        sleep(Duration::from_millis(1100));
        assert!(limiter.check("tenant-a", Tier::Free).is_ok());
    }

    #[test]
    fn unlimited_tier_has_much_larger_capacity_than_free() {
        assert!(Tier::Unlimited.preset().capacity > Tier::Free.preset().capacity);
    }
}
