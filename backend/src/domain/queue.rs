//! Idempotent at-least-once dispatch queue for notification events.
//!
//! Queue records live under `messagingQueue/<eventId>` and move through
//! `pending → processing → sent | failed`, with `pending` reachable again
//! after a transient dispatch failure. A record is claimed by flipping it to
//! `processing` before any side effect runs, and a record observed in any
//! non-pending state is left untouched, which is what makes re-invocation
//! safe.
//!
//! The claim itself is a plain write: the backing store offers no
//! compare-and-set, so two processors racing on the same event id in the
//! same instant could both observe `pending` and dispatch twice. The trigger
//! path invokes each event id at most once under normal operation, which
//! keeps that window acceptable.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::Clock;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::warn;
use utoipa::ToSchema;

use crate::domain::ports::{
    DispatchError, MessageDispatcher, OutboundMessage, QueueEvent, QueueProcessing, RecordStore,
};
use crate::domain::session::map_record_store_error;
use crate::domain::Error;

/// The one event type the processor dispatches.
pub const BOOKING_CONFIRMED_EVENT: &str = "booking.confirmed";
/// `lastError` written when a queue record does not match the schema.
const INVALID_RECORD_ERROR: &str = "Invalid messaging queue record";
/// Random suffix length on non-deterministic event ids.
const EVENT_ID_RANDOM_CHARS: usize = 8;

/// Lifecycle states of a queue record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    /// Waiting to be processed (or eligible for a retry).
    Pending,
    /// Claimed by a processor run.
    Processing,
    /// Dispatched; never reprocessed.
    Sent,
    /// Permanently failed; never reprocessed.
    Failed,
}

impl QueueStatus {
    /// Lowercase name as stored on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Processing => "processing",
            QueueStatus::Sent => "sent",
            QueueStatus::Failed => "failed",
        }
    }
}

/// A stored notification event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessagingQueueRecord {
    /// Unique event id; deterministic for deduplicated event types.
    pub event_id: String,
    /// Event discriminator; unknown values are preserved untouched.
    pub event_type: String,
    /// Event-type-specific payload.
    #[schema(value_type = Object)]
    pub payload: Value,
    /// When the event was enqueued.
    pub created_at: DateTime<Utc>,
    /// Lifecycle state.
    pub status: QueueStatus,
    /// Dispatch attempts that ended in failure.
    #[serde(default)]
    pub retry_count: u32,
    /// Message of the most recent failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// When a terminal transition happened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

/// Payload for a booking confirmation email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookingConfirmedPayload {
    /// Booking reference code.
    pub booking_code: String,
    /// Lead guest display name.
    pub guest_name: String,
    /// Recipient address.
    pub email: String,
    /// Arrival date, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_in_date: Option<String>,
}

/// Payload announcing a staff decision on an operational request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestResolvedPayload {
    /// Request the decision applies to.
    pub request_id: String,
    /// Guest display name.
    pub guest_name: String,
    /// Final status name.
    pub status: String,
}

/// Outcome of one processor invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProcessOutcome {
    /// No record exists for the event id.
    Missing,
    /// The record failed schema validation and was marked failed.
    Invalid,
    /// The event type is not dispatched by this processor.
    Unsupported {
        /// The unrecognized discriminator.
        #[serde(rename = "eventType")]
        event_type: String,
    },
    /// The record was already claimed or finished; nothing was done.
    Idempotent {
        /// `already_<status>` of the observed record.
        reason: String,
    },
    /// Dispatch succeeded.
    Sent,
    /// Dispatch failed transiently; the record is pending again.
    Retry {
        /// Total failed attempts so far.
        #[serde(rename = "retryCount")]
        retry_count: u32,
        /// Extracted failure message.
        error: String,
    },
    /// Dispatch failed permanently.
    Failed {
        /// Total failed attempts so far.
        #[serde(rename = "retryCount")]
        retry_count: u32,
        /// Extracted failure message.
        error: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureClass {
    Permanent,
    Transient,
}

/// Classify a dispatch failure.
///
/// Explicitly permanent errors and provider 4xx responses (except 429, which
/// is throttling) will not succeed on retry; everything else is assumed
/// transient.
fn classify(error: &DispatchError) -> FailureClass {
    match error {
        DispatchError::Permanent { .. } => FailureClass::Permanent,
        DispatchError::Http { status, .. } => {
            if (400..500).contains(status) && *status != 429 {
                FailureClass::Permanent
            } else {
                FailureClass::Transient
            }
        }
        DispatchError::Transport { .. } => FailureClass::Transient,
    }
}

fn queue_path(event_id: &str) -> String {
    format!("messagingQueue/{event_id}")
}

fn base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_owned();
    }
    let mut out = Vec::new();
    while value > 0 {
        let digit = usize::try_from(value % 36).unwrap_or(0);
        out.push(DIGITS[digit]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

fn random_event_id(now: DateTime<Utc>) -> String {
    let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
    let mut rng = rand::thread_rng();
    let suffix: String = (0..EVENT_ID_RANDOM_CHARS)
        .map(|_| {
            const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
            char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())])
        })
        .collect();
    format!("msg_{}_{suffix}", base36(millis))
}

fn booking_confirmed_event_id(booking_code: &str) -> String {
    let code: String = booking_code
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_uppercase();
    format!("msg_booking_confirmed_{code}")
}

fn render_booking_confirmed(payload: &BookingConfirmedPayload) -> OutboundMessage {
    let check_in = payload
        .check_in_date
        .as_deref()
        .map(|date| format!(" from {date}"))
        .unwrap_or_default();
    OutboundMessage {
        to: payload.email.clone(),
        subject: format!("Booking {} confirmed", payload.booking_code),
        text: format!(
            "Hi {},\n\nYour booking {} is confirmed{check_in}. We look forward to \
             welcoming you.\n\nThe Prime team",
            payload.guest_name, payload.booking_code
        ),
    }
}

/// Messaging queue service: event creation and the dispatch state machine.
pub struct MessagingQueueService<S, D> {
    records: Arc<S>,
    dispatcher: Arc<D>,
    clock: Arc<dyn Clock>,
}

impl<S, D> MessagingQueueService<S, D> {
    /// Create the service.
    pub fn new(records: Arc<S>, dispatcher: Arc<D>, clock: Arc<dyn Clock>) -> Self {
        Self {
            records,
            dispatcher,
            clock,
        }
    }
}

impl<S, D> MessagingQueueService<S, D>
where
    S: RecordStore,
    D: MessageDispatcher,
{
    async fn patch(&self, event_id: &str, patch: Map<String, Value>) -> Result<(), Error> {
        self.records
            .update(&queue_path(event_id), &patch)
            .await
            .map_err(map_record_store_error)
    }

    async fn mark_invalid(&self, event_id: &str, now: DateTime<Utc>) -> Result<ProcessOutcome, Error> {
        let mut patch = Map::new();
        patch.insert("status".to_owned(), json!(QueueStatus::Failed.as_str()));
        patch.insert("retryCount".to_owned(), json!(1));
        patch.insert("lastError".to_owned(), json!(INVALID_RECORD_ERROR));
        patch.insert("processedAt".to_owned(), json!(now));
        self.patch(event_id, patch).await?;
        Ok(ProcessOutcome::Invalid)
    }

    async fn settle_dispatch(
        &self,
        record: &MessagingQueueRecord,
        result: Result<(), DispatchError>,
        now: DateTime<Utc>,
    ) -> Result<ProcessOutcome, Error> {
        match result {
            Ok(()) => {
                let mut patch = Map::new();
                patch.insert("status".to_owned(), json!(QueueStatus::Sent.as_str()));
                patch.insert("lastError".to_owned(), Value::Null);
                patch.insert("processedAt".to_owned(), json!(now));
                self.patch(&record.event_id, patch).await?;
                Ok(ProcessOutcome::Sent)
            }
            Err(error) => {
                let message = error.to_string();
                let retry_count = record.retry_count.saturating_add(1);
                let mut patch = Map::new();
                patch.insert("retryCount".to_owned(), json!(retry_count));
                patch.insert("lastError".to_owned(), json!(message));
                match classify(&error) {
                    FailureClass::Permanent => {
                        patch.insert("status".to_owned(), json!(QueueStatus::Failed.as_str()));
                        patch.insert("processedAt".to_owned(), json!(now));
                        self.patch(&record.event_id, patch).await?;
                        Ok(ProcessOutcome::Failed {
                            retry_count,
                            error: message,
                        })
                    }
                    FailureClass::Transient => {
                        patch.insert("status".to_owned(), json!(QueueStatus::Pending.as_str()));
                        patch.insert("processedAt".to_owned(), Value::Null);
                        self.patch(&record.event_id, patch).await?;
                        Ok(ProcessOutcome::Retry {
                            retry_count,
                            error: message,
                        })
                    }
                }
            }
        }
    }
}

#[async_trait]
impl<S, D> QueueProcessing for MessagingQueueService<S, D>
where
    S: RecordStore,
    D: MessageDispatcher,
{
    async fn enqueue(&self, event: QueueEvent) -> Result<MessagingQueueRecord, Error> {
        let now = self.clock.utc();
        let (event_id, event_type, payload) = match &event {
            QueueEvent::BookingConfirmed(payload) => (
                booking_confirmed_event_id(&payload.booking_code),
                BOOKING_CONFIRMED_EVENT.to_owned(),
                serde_json::to_value(payload),
            ),
            QueueEvent::RequestResolved(payload) => (
                random_event_id(now),
                "request.resolved".to_owned(),
                serde_json::to_value(payload),
            ),
        };
        let payload = payload
            .map_err(|error| Error::internal(format!("failed to serialize payload: {error}")))?;

        // Deterministic ids collapse repeated triggers into one record; the
        // first write wins and later triggers see the existing record.
        if matches!(event, QueueEvent::BookingConfirmed(_)) {
            if let Some(existing) = self
                .records
                .get(&queue_path(&event_id))
                .await
                .map_err(map_record_store_error)?
            {
                let existing: MessagingQueueRecord = serde_json::from_value(existing)
                    .map_err(|error| {
                        Error::internal(format!("malformed queue record: {error}"))
                    })?;
                return Ok(existing);
            }
        }

        let record = MessagingQueueRecord {
            event_id: event_id.clone(),
            event_type,
            payload,
            created_at: now,
            status: QueueStatus::Pending,
            retry_count: 0,
            last_error: None,
            processed_at: None,
        };
        let value = serde_json::to_value(&record)
            .map_err(|error| Error::internal(format!("failed to serialize record: {error}")))?;
        self.records
            .set(&queue_path(&event_id), &value)
            .await
            .map_err(map_record_store_error)?;
        Ok(record)
    }

    async fn process(&self, event_id: &str) -> Result<ProcessOutcome, Error> {
        let now = self.clock.utc();

        let Some(raw) = self
            .records
            .get(&queue_path(event_id))
            .await
            .map_err(map_record_store_error)?
        else {
            return Ok(ProcessOutcome::Missing);
        };

        let record: MessagingQueueRecord = match serde_json::from_value(raw) {
            Ok(record) => record,
            Err(_) => return self.mark_invalid(event_id, now).await,
        };

        if record.event_type != BOOKING_CONFIRMED_EVENT {
            return Ok(ProcessOutcome::Unsupported {
                event_type: record.event_type,
            });
        }

        if record.status != QueueStatus::Pending {
            return Ok(ProcessOutcome::Idempotent {
                reason: format!("already_{}", record.status.as_str()),
            });
        }

        let payload: BookingConfirmedPayload = match serde_json::from_value(record.payload.clone())
        {
            Ok(payload) => payload,
            Err(_) => return self.mark_invalid(event_id, now).await,
        };

        // Claim before any side effect; see the module notes on the race
        // this plain write leaves open.
        let mut claim = Map::new();
        claim.insert("status".to_owned(), json!(QueueStatus::Processing.as_str()));
        claim.insert("lastError".to_owned(), Value::Null);
        self.patch(event_id, claim).await?;

        let message = render_booking_confirmed(&payload);
        let result = match self.dispatcher.send(&message).await {
            Ok(crate::domain::ports::DispatchReceipt::Delivered { .. }) => Ok(()),
            Ok(crate::domain::ports::DispatchReceipt::NotConfigured) => {
                warn!(event_id, "dispatch skipped: no provider configured");
                Ok(())
            }
            Err(error) => Err(error),
        };

        self.settle_dispatch(&record, result, now).await
    }
}
