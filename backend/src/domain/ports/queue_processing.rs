//! Driving port for the messaging queue.

use async_trait::async_trait;

use crate::domain::queue::{
    BookingConfirmedPayload, MessagingQueueRecord, ProcessOutcome, RequestResolvedPayload,
};
use crate::domain::Error;

/// Events accepted into the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    /// A booking was confirmed; deduplicated by booking code.
    BookingConfirmed(BookingConfirmedPayload),
    /// A staff decision was recorded on an operational request.
    RequestResolved(RequestResolvedPayload),
}

/// Port for queue event creation and processing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueueProcessing: Send + Sync {
    /// Store a new queue record, collapsing deduplicated event ids.
    async fn enqueue(&self, event: QueueEvent) -> Result<MessagingQueueRecord, Error>;

    /// Run the dispatch state machine for one event id.
    ///
    /// Dispatch failures are converted into state transitions and reported
    /// in the outcome; only store failures surface as errors.
    async fn process(&self, event_id: &str) -> Result<ProcessOutcome, Error>;
}
