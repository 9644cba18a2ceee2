//! Domain port for recording direct-message telemetry events.
//!
//! Recording is strictly best-effort: callers wrap it so a failed increment
//! can never affect the primary response. Implementations may write to the
//! counter store, log, or discard events in tests.

use async_trait::async_trait;

use super::define_port_error;

define_port_error! {
    /// Errors exposed when recording telemetry.
    pub enum TelemetryError {
        /// The backing counter store rejected the write.
        Store { message: String } => "telemetry counter write failed: {message}",
    }
}

/// Metric identifiers for the direct-message feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TelemetryMetric {
    /// A direct message was delivered.
    WriteSuccess,
    /// A write was rejected by the rate limiter.
    WriteRateLimited,
    /// A write was rejected because a participant is not a confirmed guest.
    WriteDeniedNotConfirmedGuests,
    /// An inbox read succeeded.
    ReadSuccess,
    /// A read was rejected by the rate limiter.
    ReadRateLimited,
}

impl TelemetryMetric {
    /// All metrics served by the telemetry report.
    pub const ALL: [TelemetryMetric; 5] = [
        TelemetryMetric::WriteSuccess,
        TelemetryMetric::WriteRateLimited,
        TelemetryMetric::WriteDeniedNotConfirmedGuests,
        TelemetryMetric::ReadSuccess,
        TelemetryMetric::ReadRateLimited,
    ];

    /// Stable key used in counter-store bucket names and report payloads.
    pub fn key(self) -> &'static str {
        match self {
            TelemetryMetric::WriteSuccess => "write.success",
            TelemetryMetric::WriteRateLimited => "write.rate_limited",
            TelemetryMetric::WriteDeniedNotConfirmedGuests => {
                "write.denied_not_confirmed_guests"
            }
            TelemetryMetric::ReadSuccess => "read.success",
            TelemetryMetric::ReadRateLimited => "read.rate_limited",
        }
    }
}

/// Port for telemetry event recording.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TelemetryRecorder: Send + Sync {
    /// Increment today's bucket for `metric`.
    async fn record(&self, metric: TelemetryMetric) -> Result<(), TelemetryError>;
}

/// No-op implementation for when telemetry is disabled or in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpTelemetryRecorder;

#[async_trait]
impl TelemetryRecorder for NoOpTelemetryRecorder {
    async fn record(&self, _metric: TelemetryMetric) -> Result<(), TelemetryError> {
        Ok(())
    }
}
