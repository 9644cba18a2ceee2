//! Driving port for guest operational requests.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::domain::requests::{PrimeRequestRecord, PrimeRequestStatus, PrimeRequestType};
use crate::domain::Error;

/// A guest submission of an operational request.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitPrimeRequest {
    /// Guest session token.
    pub token: Option<String>,
    /// Booking id claimed alongside the token, cross-checked against the
    /// session.
    pub claimed_booking_id: Option<String>,
    /// Request kind.
    pub request_type: PrimeRequestType,
    /// Free-form note from the guest.
    pub note: Option<String>,
    /// Kind-specific fields.
    pub payload: Map<String, Value>,
}

/// Result of a submission.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// A new record was written.
    Created {
        /// The stored record.
        record: PrimeRequestRecord,
    },
    /// An equivalent submission inside the dedupe window was replayed.
    Deduplicated {
        /// Id of the original record.
        request_id: String,
    },
}

/// A staff decision on a pending request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateStatusRequest {
    /// The request to update.
    pub request_id: String,
    /// The new lifecycle state.
    pub new_status: PrimeRequestStatus,
    /// Optional staff note recorded with the decision.
    pub resolution: Option<String>,
}

/// Port for request submission and staff decisions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PrimeRequestCommand: Send + Sync {
    /// Validate, rate-limit, dedupe, and store a guest request.
    async fn submit(&self, request: SubmitPrimeRequest) -> Result<SubmitOutcome, Error>;

    /// Apply a staff status decision, moving the `byStatus` index entry.
    async fn update_status(
        &self,
        request: UpdateStatusRequest,
    ) -> Result<PrimeRequestRecord, Error>;
}
