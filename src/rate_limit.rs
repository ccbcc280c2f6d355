//! Rate limiting for public endpoints.
//!
//! Two layers:
//! - Per-IP, applied as a tower layer on each public route:
//!   - Check: /license/check
//!   - Relaxed: /health
//! - Per-license-key and per-hwid, applied inside the check handler before
//!   the store is touched. Blunts key stuffing from many IPs and hwid
//!   enumeration against one key.
//!
//! Configure via environment variables:
//! - RATE_LIMIT_CHECK_RPM (default: 30)
//! - RATE_LIMIT_RELAXED_RPM (default: 60)
//! - RATE_LIMIT_KEY_RPM (default: 10)
//! - RATE_LIMIT_HWID_RPM (default: 10)

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;

use crate::util::fingerprint;

/// Rate limiter layer type alias using governor types directly
pub type RateLimitLayer = GovernorLayer<
    tower_governor::key_extractor::PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware<governor::clock::QuantaInstant>,
    axum::body::Body,
>;

/// Creates a rate limiter layer with the specified requests per minute.
///
/// Zero limits are rejected when the configuration is loaded.
fn create_layer(requests_per_minute: u32) -> RateLimitLayer {
    let requests_per_minute = requests_per_minute.max(1);
    let period_secs = 60 / requests_per_minute as u64;
    let config = GovernorConfigBuilder::default()
        .period(Duration::from_secs(period_secs.max(1)))
        .burst_size(requests_per_minute)
        .finish()
        .expect("period and burst size are non-zero");

    GovernorLayer::new(Arc::new(config))
}

/// Creates a rate limiter layer for the license check endpoint.
pub fn check_layer(requests_per_minute: u32) -> RateLimitLayer {
    create_layer(requests_per_minute)
}

/// Creates a rate limiter layer for the relaxed tier.
/// Used for lightweight endpoints like health checks.
pub fn relaxed_layer(requests_per_minute: u32) -> RateLimitLayer {
    create_layer(requests_per_minute)
}

/// Which keyed limit a check ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Throttled {
    LicenseKey,
    Hwid,
}

/// Per-key and per-hwid limiter for license checks.
///
/// Limiter state is keyed by fingerprints, so raw keys are never held in
/// memory longer than the request.
pub struct CheckRateLimiter {
    by_key: DefaultKeyedRateLimiter<String>,
    by_hwid: DefaultKeyedRateLimiter<String>,
}

impl CheckRateLimiter {
    pub fn new(key_per_minute: u32, hwid_per_minute: u32) -> Self {
        Self {
            by_key: RateLimiter::keyed(per_minute(key_per_minute)),
            by_hwid: RateLimiter::keyed(per_minute(hwid_per_minute)),
        }
    }

    /// Record one check for `key` and `hwid`, failing if either is over its
    /// limit.
    pub fn check(&self, key: &str, hwid: &str) -> Result<(), Throttled> {
        if self.by_key.check_key(&fingerprint(key)).is_err() {
            return Err(Throttled::LicenseKey);
        }
        if self.by_hwid.check_key(&fingerprint(hwid)).is_err() {
            return Err(Throttled::Hwid);
        }
        Ok(())
    }

    /// Drop state for keys whose quota has fully replenished.
    pub fn retain_recent(&self) {
        self.by_key.retain_recent();
        self.by_hwid.retain_recent();
    }

    /// Number of tracked keys across both limiters.
    pub fn len(&self) -> usize {
        self.by_key.len() + self.by_hwid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CheckRateLimiter {
    fn default() -> Self {
        Self::new(10, 10)
    }
}

fn per_minute(requests: u32) -> Quota {
    Quota::per_minute(NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN))
}
