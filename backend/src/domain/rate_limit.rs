//! Fixed-window rate limiting over the counter store.
//!
//! Counters live under composite keys (`<feature>:<scope-id>`) with a TTL
//! equal to the window length. The limiter is deliberately approximate: a
//! read-modify-write pair under concurrent access can lose an increment and
//! under-count the true request rate. Limits here are soft throttles, not
//! hard admission control, so no locking is layered on top.
//!
//! The limiter also fails open: if the counter store cannot be reached the
//! request is allowed and a warning logged. Throttling must never take the
//! portal down with it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mockable::Clock;
use serde_json::json;
use tracing::warn;

use crate::domain::ports::{CounterStore, TelemetryMetric, TelemetryRecorder};
use crate::domain::telemetry::record_best_effort;
use crate::domain::Error;

/// A maximum request count over a fixed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitQuota {
    /// Requests allowed inside one window.
    pub max_requests: u32,
    /// Window length; also the TTL of the backing counter.
    pub window: Duration,
}

/// Per-feature quotas used by the portal endpoints.
pub mod quotas {
    use super::RateLimitQuota;
    use std::time::Duration;

    /// Booking lookup / session issue, per client IP.
    pub const LOOKUP: RateLimitQuota = RateLimitQuota {
        max_requests: 5,
        window: Duration::from_secs(3600),
    };

    /// Extension requests, per guest.
    pub const EXTENSION_REQUEST: RateLimitQuota = RateLimitQuota {
        max_requests: 5,
        window: Duration::from_secs(3600),
    };

    /// Bag-drop requests, per guest.
    pub const BAG_DROP: RateLimitQuota = RateLimitQuota {
        max_requests: 3,
        window: Duration::from_secs(3600),
    };

    /// Meal-change exception requests, per guest.
    pub const MEAL_CHANGE_EXCEPTION: RateLimitQuota = RateLimitQuota {
        max_requests: 3,
        window: Duration::from_secs(3600),
    };

    /// Direct-message writes, per guest.
    pub const DIRECT_MESSAGE_WRITE: RateLimitQuota = RateLimitQuota {
        max_requests: 40,
        window: Duration::from_secs(60),
    };

    /// Direct-message inbox reads, per guest.
    pub const DIRECT_MESSAGE_READ: RateLimitQuota = RateLimitQuota {
        max_requests: 120,
        window: Duration::from_secs(60),
    };
}

/// Snapshot of a blocked request's window, used to render response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitBlock {
    /// Window quota.
    pub limit: u32,
    /// Window length in seconds; doubles as the `Retry-After` value.
    pub window_seconds: u64,
    /// When the current window is expected to reset.
    pub reset_at: DateTime<Utc>,
}

impl RateLimitBlock {
    /// Convert the block into the wire error carrying header metadata.
    ///
    /// The inbound adapter reads `limit`, `windowSeconds`, and `resetAt` out
    /// of the details to populate `Retry-After` and the `RateLimit-*` /
    /// `X-RateLimit-*` header families.
    pub fn to_error(&self) -> Error {
        Error::rate_limited("Rate limit exceeded").with_details(json!({
            "limit": self.limit,
            "windowSeconds": self.window_seconds,
            "resetAt": self.reset_at.timestamp(),
        }))
    }
}

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// The request is admitted.
    Allowed {
        /// Requests left in the current window after this one.
        remaining: u32,
    },
    /// The request exceeds the quota for the current window.
    Blocked(RateLimitBlock),
}

/// Fixed-window rate limiter backed by the counter store.
pub struct RateLimiter<C> {
    counters: Arc<C>,
    telemetry: Arc<dyn TelemetryRecorder>,
    clock: Arc<dyn Clock>,
}

// Manual impl: `derive(Clone)` would demand `C: Clone`, but only the `Arc`s
// are cloned.
impl<C> Clone for RateLimiter<C> {
    fn clone(&self) -> Self {
        Self {
            counters: Arc::clone(&self.counters),
            telemetry: Arc::clone(&self.telemetry),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<C> RateLimiter<C> {
    /// Create a limiter over the given counter store.
    pub fn new(counters: Arc<C>, telemetry: Arc<dyn TelemetryRecorder>, clock: Arc<dyn Clock>) -> Self {
        Self {
            counters,
            telemetry,
            clock,
        }
    }
}

impl<C> RateLimiter<C>
where
    C: CounterStore,
{
    /// Admit or block one request under `key`.
    ///
    /// When the request is blocked and `block_metric` is set, the metric is
    /// bumped best-effort before returning; a failed increment never affects
    /// the decision.
    pub async fn enforce(
        &self,
        key: &str,
        quota: RateLimitQuota,
        block_metric: Option<TelemetryMetric>,
    ) -> RateLimitDecision {
        let current = match self.counters.get(key).await {
            Ok(value) => parse_count(value.as_deref()),
            Err(error) => {
                warn!(%error, key, "rate limit counter read failed; allowing request");
                return RateLimitDecision::Allowed {
                    remaining: quota.max_requests.saturating_sub(1),
                };
            }
        };

        if current >= quota.max_requests {
            if let Some(metric) = block_metric {
                record_best_effort(self.telemetry.as_ref(), metric).await;
            }
            let window_seconds = quota.window.as_secs();
            let reset_at = self.clock.utc()
                + chrono::Duration::from_std(quota.window)
                    .unwrap_or_else(|_| chrono::Duration::seconds(0));
            return RateLimitDecision::Blocked(RateLimitBlock {
                limit: quota.max_requests,
                window_seconds,
                reset_at,
            });
        }

        let next = current.saturating_add(1);
        if let Err(error) = self
            .counters
            .put(key, &next.to_string(), quota.window)
            .await
        {
            warn!(%error, key, "rate limit counter write failed; allowing request");
        }

        RateLimitDecision::Allowed {
            remaining: quota.max_requests.saturating_sub(next),
        }
    }
}

/// Lenient counter parsing: absent, unparsable, or negative values count as 0.
fn parse_count(value: Option<&str>) -> u32 {
    value
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .filter(|count| *count >= 0)
        .and_then(|count| u32::try_from(count).ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{MemoryCounterStore, NoOpTelemetryRecorder};
    use mockable::DefaultClock;
    use rstest::rstest;

    fn limiter(counters: Arc<MemoryCounterStore>) -> RateLimiter<MemoryCounterStore> {
        RateLimiter::new(
            counters,
            Arc::new(NoOpTelemetryRecorder),
            Arc::new(DefaultClock),
        )
    }

    const QUOTA: RateLimitQuota = RateLimitQuota {
        max_requests: 3,
        window: Duration::from_secs(60),
    };

    #[rstest]
    #[case(None, 0)]
    #[case(Some("4"), 4)]
    #[case(Some(" 7 "), 7)]
    #[case(Some("-2"), 0)]
    #[case(Some("garbage"), 0)]
    fn parse_count_is_lenient(#[case] raw: Option<&str>, #[case] expected: u32) {
        assert_eq!(parse_count(raw), expected);
    }

    #[tokio::test]
    async fn allows_up_to_the_quota_then_blocks() {
        let counters = Arc::new(MemoryCounterStore::new());
        let limiter = limiter(Arc::clone(&counters));

        for n in 1..=QUOTA.max_requests {
            let decision = limiter.enforce("feature:guest-1", QUOTA, None).await;
            assert_eq!(
                decision,
                RateLimitDecision::Allowed {
                    remaining: QUOTA.max_requests - n
                },
                "request {n} should be allowed"
            );
        }

        match limiter.enforce("feature:guest-1", QUOTA, None).await {
            RateLimitDecision::Blocked(block) => {
                assert_eq!(block.limit, 3);
                assert_eq!(block.window_seconds, 60);
            }
            RateLimitDecision::Allowed { .. } => panic!("request over quota should block"),
        }
    }

    #[tokio::test]
    async fn distinct_keys_do_not_interfere() {
        let counters = Arc::new(MemoryCounterStore::new());
        let limiter = limiter(Arc::clone(&counters));

        for _ in 0..QUOTA.max_requests {
            limiter.enforce("feature:guest-1", QUOTA, None).await;
        }
        let decision = limiter.enforce("feature:guest-2", QUOTA, None).await;
        assert!(matches!(decision, RateLimitDecision::Allowed { .. }));
    }

    #[tokio::test]
    async fn pre_seeded_counter_at_quota_blocks_immediately() {
        let counters = Arc::new(MemoryCounterStore::new());
        counters
            .put("direct-message:write:occ_aaa", "40", Duration::from_secs(60))
            .await
            .expect("seed counter");
        let limiter = limiter(Arc::clone(&counters));

        let decision = limiter
            .enforce(
                "direct-message:write:occ_aaa",
                quotas::DIRECT_MESSAGE_WRITE,
                None,
            )
            .await;
        assert!(matches!(decision, RateLimitDecision::Blocked(_)));
    }

    #[test]
    fn block_error_carries_header_metadata() {
        let block = RateLimitBlock {
            limit: 40,
            window_seconds: 60,
            reset_at: chrono::Utc::now(),
        };
        let error = block.to_error();
        let details = error.details().expect("details set");
        assert_eq!(details["limit"], 40);
        assert_eq!(details["windowSeconds"], 60);
        assert!(details["resetAt"].is_i64());
    }
}
