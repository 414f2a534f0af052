//! Rate limiting service for caller credentials.
//!
//! Per-credential token buckets via the governor crate. A credential's
//! quota comes from its explicit configuration, or from its tier ceiling
//! (see [`crate::core::resources::tier_rate_limit`]) when none is set.
//! Keys without a registered limiter are not limited.

use dashmap::DashMap;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorRateLimiter,
};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::core::config::RateLimitConfig;
use crate::core::error::GatewayError;

/// Type alias for the rate limiter instance
type RateLimiterInstance = Arc<GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Rate limiter for managing per-credential request limits.
pub struct RateLimiter {
    /// Map of key hash -> rate limiter instance
    limiters: Arc<DashMap<String, RateLimiterInstance>>,
}

impl RateLimiter {
    /// Create a new rate limiter instance.
    pub fn new() -> Self {
        Self {
            limiters: Arc::new(DashMap::new()),
        }
    }

    /// Register a key hash with rate limiting.
    pub fn register_key(&self, key_hash: &str, config: &RateLimitConfig) {
        let quota = Quota::per_second(
            NonZeroU32::new(config.requests_per_second).unwrap_or(nonzero!(1u32)),
        )
        .allow_burst(NonZeroU32::new(config.burst_size).unwrap_or(nonzero!(10u32)));

        let limiter = Arc::new(GovernorRateLimiter::direct(quota));
        self.limiters.insert(key_hash.to_string(), limiter);
    }

    /// Check if a request is allowed for the given key hash.
    ///
    /// Returns `Err(GatewayError::RateLimited)` when the quota is exhausted.
    pub fn check_rate_limit(&self, key_hash: &str) -> Result<(), GatewayError> {
        if let Some(limiter) = self.limiters.get(key_hash) {
            match limiter.check() {
                Ok(_) => Ok(()),
                Err(_) => {
                    tracing::warn!(
                        key_hash_prefix = &key_hash[..key_hash.len().min(8)],
                        "Rate limit exceeded"
                    );
                    Err(GatewayError::RateLimited(
                        "Rate limit exceeded for key".to_string(),
                    ))
                }
            }
        } else {
            // No rate limit configured for this key
            Ok(())
        }
    }

    /// Remove a key from rate limiting.
    pub fn remove_key(&self, key_hash: &str) {
        self.limiters.remove(key_hash);
    }

    /// Clear all rate limiters.
    pub fn clear(&self) {
        self.limiters.clear();
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
