// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Source Rate Limiter
 * Token bucket pacing for outbound connector queries
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorRateLimiter,
};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::time::Duration;

/// Paces a single connector's outbound queries. Each connector awaits
/// `until_ready` before every external call so a chatty data source cannot
/// be hammered regardless of how fast names arrive.
pub struct SourceRateLimiter {
    limiter: GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl SourceRateLimiter {
    pub fn per_second(rps: u32) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(rps).unwrap_or(nonzero!(1u32)));
        Self {
            limiter: GovernorRateLimiter::direct(quota),
        }
    }

    /// One query per `period`, e.g. `with_period(Duration::from_millis(500))`
    /// for API sources that document a fixed inter-request delay.
    pub fn with_period(period: Duration) -> Self {
        let quota = Quota::with_period(period).unwrap_or_else(|| Quota::per_second(nonzero!(1u32)));
        Self {
            limiter: GovernorRateLimiter::direct(quota),
        }
    }

    pub async fn until_ready(&self) {
        self.limiter.until_ready().await;
    }

    pub fn check(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_first_query_passes_immediately() {
        let limiter = SourceRateLimiter::per_second(10);
        let start = Instant::now();
        limiter.until_ready().await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_period_enforced() {
        let limiter = SourceRateLimiter::with_period(Duration::from_millis(50));
        let start = Instant::now();
        limiter.until_ready().await;
        limiter.until_ready().await;
        limiter.until_ready().await;
        // Two waits of ~50ms after the initial token
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[test]
    fn test_zero_rps_clamps_to_one() {
        // Must not panic on a degenerate configuration
        let _ = SourceRateLimiter::per_second(0);
    }
}
