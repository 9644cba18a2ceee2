//! Day-bucketed direct-message telemetry.
//!
//! Counters live in the counter store under
//! `direct-telemetry:<metric>:<YYYY-MM-DD>` with a 35-day TTL, long enough
//! for the widest reporting window plus comparison period. Recording is
//! fire-and-forget; the reporting side rolls buckets up into totals and a
//! per-day breakdown.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

use crate::domain::ports::{
    CounterStore, TelemetryError, TelemetryMetric, TelemetryRecorder, TelemetryReporting,
};
use crate::domain::Error;

/// Retention of day buckets, sized to cover a 30-day window plus slack.
const BUCKET_TTL: Duration = Duration::from_secs(35 * 24 * 60 * 60);
/// Default reporting window in days.
pub const DEFAULT_WINDOW_DAYS: u32 = 7;
/// Largest reporting window served.
pub const MAX_WINDOW_DAYS: u32 = 30;

/// Rolled-up telemetry over a reporting window.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryReport {
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Number of day buckets covered.
    pub window_days: u32,
    /// Covered days in chronological order (`YYYY-MM-DD`).
    pub day_buckets: Vec<String>,
    /// Sum per metric over the whole window.
    pub totals: BTreeMap<String, u64>,
    /// Per-day metric counts, keyed by day bucket.
    pub by_day: BTreeMap<String, BTreeMap<String, u64>>,
}

fn bucket_key(metric: TelemetryMetric, day: &str) -> String {
    format!("direct-telemetry:{}:{day}", metric.key())
}

fn day_bucket(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}

fn parse_total(value: Option<&str>) -> u64 {
    value
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .filter(|count| *count >= 0)
        .and_then(|count| u64::try_from(count).ok())
        .unwrap_or(0)
}

/// Record a metric, swallowing and logging any failure.
///
/// Telemetry must never affect the primary response; every caller goes
/// through this wrapper instead of propagating recorder errors.
pub async fn record_best_effort(recorder: &dyn TelemetryRecorder, metric: TelemetryMetric) {
    if let Err(error) = recorder.record(metric).await {
        warn!(%error, metric = metric.key(), "telemetry increment failed");
    }
}

/// Telemetry service over the counter store.
#[derive(Clone)]
pub struct DirectTelemetryService<C> {
    counters: Arc<C>,
    clock: Arc<dyn Clock>,
}

impl<C> DirectTelemetryService<C> {
    /// Create a telemetry service.
    pub fn new(counters: Arc<C>, clock: Arc<dyn Clock>) -> Self {
        Self { counters, clock }
    }
}

#[async_trait]
impl<C> TelemetryRecorder for DirectTelemetryService<C>
where
    C: CounterStore,
{
    async fn record(&self, metric: TelemetryMetric) -> Result<(), TelemetryError> {
        let key = bucket_key(metric, &day_bucket(self.clock.utc()));
        let current = self
            .counters
            .get(&key)
            .await
            .map_err(|error| TelemetryError::store(error.to_string()))?;
        let next = parse_total(current.as_deref()).saturating_add(1);
        self.counters
            .put(&key, &next.to_string(), BUCKET_TTL)
            .await
            .map_err(|error| TelemetryError::store(error.to_string()))
    }
}

#[async_trait]
impl<C> TelemetryReporting for DirectTelemetryService<C>
where
    C: CounterStore,
{
    async fn report(&self, window_days: u32) -> Result<TelemetryReport, Error> {
        let window_days = window_days.clamp(1, MAX_WINDOW_DAYS);
        let now = self.clock.utc();

        let mut day_buckets = Vec::with_capacity(window_days as usize);
        for offset in (0..window_days).rev() {
            day_buckets.push(day_bucket(now - chrono::Duration::days(i64::from(offset))));
        }

        let mut totals: BTreeMap<String, u64> = BTreeMap::new();
        let mut by_day: BTreeMap<String, BTreeMap<String, u64>> = BTreeMap::new();

        for day in &day_buckets {
            let mut day_totals = BTreeMap::new();
            for metric in TelemetryMetric::ALL {
                let value = self
                    .counters
                    .get(&bucket_key(metric, day))
                    .await
                    .map_err(|error| {
                        Error::internal(format!("telemetry counter read failed: {error}"))
                    })?;
                let count = parse_total(value.as_deref());
                *totals.entry(metric.key().to_owned()).or_insert(0) += count;
                day_totals.insert(metric.key().to_owned(), count);
            }
            by_day.insert(day.clone(), day_totals);
        }

        Ok(TelemetryReport {
            generated_at: now,
            window_days,
            day_buckets,
            totals,
            by_day,
        })
    }
}
