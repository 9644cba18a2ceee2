//! Driving port for the telemetry report.

use async_trait::async_trait;

use crate::domain::telemetry::TelemetryReport;
use crate::domain::Error;

/// Port for rolling day buckets up into a report.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TelemetryReporting: Send + Sync {
    /// Build a report over the trailing `window_days` days (clamped to the
    /// served maximum).
    async fn report(&self, window_days: u32) -> Result<TelemetryReport, Error>;
}
