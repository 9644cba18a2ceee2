//! Canonical operational request records and their fan-out indexes.
//!
//! Guest-initiated requests (stay extensions, bag drops, meal-change
//! exceptions) are written once under `primeRequests/` and fanned out into
//! four index views in a single multi-path update, so no view can be
//! observed out of sync with the primary record. Status transitions patch
//! the primary record and move the id between `byStatus` buckets in one
//! write as well.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use mockable::Clock;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use tracing::warn;
use utoipa::ToSchema;

use crate::domain::ports::{
    CounterStore, PrimeRequestCommand, RecordStore, SubmitOutcome, SubmitPrimeRequest,
    UpdateStatusRequest,
};
use crate::domain::rate_limit::{quotas, RateLimitDecision, RateLimitQuota, RateLimiter};
use crate::domain::session::{ensure_booking_scope, load_session, map_record_store_error};
use crate::domain::Error;

/// Root path of the request tree in the record store.
const REQUESTS_ROOT: &str = "primeRequests";
/// How long a dedupe entry replays the original submission.
const DEDUPE_TTL: Duration = Duration::from_secs(600);
/// Random hex characters appended to request ids.
const REQUEST_ID_RANDOM_HEX: usize = 12;

/// Kinds of guest-initiated operational requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PrimeRequestType {
    /// Stay extension.
    Extension,
    /// Luggage drop before check-in or after checkout.
    BagDrop,
    /// Exception to an already-closed meal order window.
    MealChangeException,
}

impl PrimeRequestType {
    /// Identifier used in request ids and the `byType` index.
    pub fn as_str(self) -> &'static str {
        match self {
            PrimeRequestType::Extension => "extension",
            PrimeRequestType::BagDrop => "bag_drop",
            PrimeRequestType::MealChangeException => "meal_change_exception",
        }
    }

    /// Rate-limit feature key for this request kind.
    pub fn feature_key(self) -> &'static str {
        match self {
            PrimeRequestType::Extension => "extension-request",
            PrimeRequestType::BagDrop => "bag-drop",
            PrimeRequestType::MealChangeException => "meal-change-exception",
        }
    }

    /// Quota applied per guest for this request kind.
    pub fn quota(self) -> RateLimitQuota {
        match self {
            PrimeRequestType::Extension => quotas::EXTENSION_REQUEST,
            PrimeRequestType::BagDrop => quotas::BAG_DROP,
            PrimeRequestType::MealChangeException => quotas::MEAL_CHANGE_EXCEPTION,
        }
    }
}

/// Lifecycle states of a request record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PrimeRequestStatus {
    /// Awaiting a staff decision.
    Pending,
    /// Approved by staff.
    Approved,
    /// Declined by staff.
    Declined,
    /// Fulfilled.
    Completed,
}

impl PrimeRequestStatus {
    /// Identifier used in the `byStatus` index.
    pub fn as_str(self) -> &'static str {
        match self {
            PrimeRequestStatus::Pending => "pending",
            PrimeRequestStatus::Approved => "approved",
            PrimeRequestStatus::Declined => "declined",
            PrimeRequestStatus::Completed => "completed",
        }
    }

    fn can_transition_to(self, next: PrimeRequestStatus) -> bool {
        match self {
            PrimeRequestStatus::Pending => next != PrimeRequestStatus::Pending,
            PrimeRequestStatus::Approved => next == PrimeRequestStatus::Completed,
            PrimeRequestStatus::Declined | PrimeRequestStatus::Completed => false,
        }
    }
}

/// A guest-initiated operational request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrimeRequestRecord {
    /// Globally unique id, `<type>_<epochMillis>_<12-hex>`.
    pub request_id: String,
    /// Request kind.
    #[serde(rename = "type")]
    pub request_type: PrimeRequestType,
    /// Lifecycle state.
    pub status: PrimeRequestStatus,
    /// Booking the request belongs to.
    pub booking_id: String,
    /// Guest who submitted it.
    pub guest_uuid: String,
    /// Display name snapshot taken at submission time.
    pub guest_name: String,
    /// Submission instant.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub submitted_at: DateTime<Utc>,
    /// Last modification instant.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    /// Free-form note from the guest.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Kind-specific fields.
    #[schema(value_type = Object)]
    pub payload: Map<String, Value>,
    /// Staff note recorded with the final decision.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

/// Generate a request id that is practically unique without coordination.
pub fn generate_request_id(request_type: PrimeRequestType, now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let mut random = String::with_capacity(REQUEST_ID_RANDOM_HEX);
    for _ in 0..REQUEST_ID_RANDOM_HEX {
        let nibble: u8 = rng.gen_range(0..16);
        random.push(char::from_digit(u32::from(nibble), 16).unwrap_or('0'));
    }
    format!(
        "{}_{}_{}",
        request_type.as_str(),
        now.timestamp_millis(),
        random
    )
}

/// First 16 hex chars of SHA-256 over the deduplicated tuple.
fn dedupe_digest(guest_uuid: &str, date: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(guest_uuid.as_bytes());
    hasher.update(b":");
    hasher.update(date.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest.chars().take(16).collect()
}

fn dedupe_key(booking_id: &str, guest_uuid: &str, date: &str) -> String {
    format!(
        "extension-request:dedupe:{booking_id}:{}",
        dedupe_digest(guest_uuid, date)
    )
}

fn fan_out_patch(record: &PrimeRequestRecord) -> Result<Map<String, Value>, Error> {
    let id = &record.request_id;
    let value = serde_json::to_value(record)
        .map_err(|error| Error::internal(format!("failed to serialize request: {error}")))?;

    let mut patch = Map::new();
    patch.insert(format!("byId/{id}"), value);
    patch.insert(format!("byGuest/{}/{id}", record.guest_uuid), json!(true));
    patch.insert(
        format!("byStatus/{}/{id}", record.status.as_str()),
        json!(true),
    );
    patch.insert(
        format!("byType/{}/{id}", record.request_type.as_str()),
        json!(true),
    );
    Ok(patch)
}

fn status_patch(
    request_id: &str,
    old: PrimeRequestStatus,
    new: PrimeRequestStatus,
    resolution: Option<&str>,
    now: DateTime<Utc>,
) -> Map<String, Value> {
    let mut patch = Map::new();
    patch.insert(format!("byId/{request_id}/status"), json!(new.as_str()));
    patch.insert(
        format!("byId/{request_id}/updatedAt"),
        json!(now.timestamp_millis()),
    );
    if let Some(resolution) = resolution {
        patch.insert(format!("byId/{request_id}/resolution"), json!(resolution));
    }
    patch.insert(format!("byStatus/{}/{request_id}", old.as_str()), Value::Null);
    patch.insert(format!("byStatus/{}/{request_id}", new.as_str()), json!(true));
    patch
}

fn parse_request_date(payload: &Map<String, Value>, field: &str) -> Result<NaiveDate, Error> {
    let raw = payload
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::invalid_request(format!("Field '{field}' is required")))?;
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| Error::invalid_request(format!("Field '{field}' must be a YYYY-MM-DD date")))
}

/// Request submission and status update service.
#[derive(Clone)]
pub struct PrimeRequestService<S, C> {
    records: Arc<S>,
    counters: Arc<C>,
    limiter: RateLimiter<C>,
    clock: Arc<dyn Clock>,
}

impl<S, C> PrimeRequestService<S, C> {
    /// Create the service.
    pub fn new(
        records: Arc<S>,
        counters: Arc<C>,
        limiter: RateLimiter<C>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            records,
            counters,
            limiter,
            clock,
        }
    }
}

impl<S, C> PrimeRequestService<S, C>
where
    S: RecordStore,
    C: CounterStore,
{
    async fn validate_payload(
        &self,
        request_type: PrimeRequestType,
        booking_id: &str,
        payload: &Map<String, Value>,
    ) -> Result<(), Error> {
        match request_type {
            PrimeRequestType::Extension => {
                let requested = parse_request_date(payload, "requestedCheckoutDate")?;
                let meta = self
                    .records
                    .get(&format!("bookings/{booking_id}/meta"))
                    .await
                    .map_err(map_record_store_error)?;
                let current = meta
                    .as_ref()
                    .and_then(|value| value.get("checkOutDate"))
                    .and_then(Value::as_str)
                    .and_then(|raw| NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok());
                if let Some(current) = current {
                    if requested <= current {
                        return Err(Error::conflict(
                            "Extension must move checkout to a later date",
                        ));
                    }
                }
                Ok(())
            }
            PrimeRequestType::BagDrop => {
                let bags = payload
                    .get("bags")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| Error::invalid_request("Field 'bags' is required"))?;
                if bags == 0 {
                    return Err(Error::invalid_request("Field 'bags' must be positive"));
                }
                Ok(())
            }
            PrimeRequestType::MealChangeException => {
                parse_request_date(payload, "mealDate").map(|_| ())
            }
        }
    }

    fn extension_dedupe_key(
        request_type: PrimeRequestType,
        booking_id: &str,
        guest_uuid: &str,
        payload: &Map<String, Value>,
    ) -> Option<String> {
        if request_type != PrimeRequestType::Extension {
            return None;
        }
        payload
            .get("requestedCheckoutDate")
            .and_then(Value::as_str)
            .map(|date| dedupe_key(booking_id, guest_uuid, date.trim()))
    }
}

#[async_trait]
impl<S, C> PrimeRequestCommand for PrimeRequestService<S, C>
where
    S: RecordStore,
    C: CounterStore,
{
    async fn submit(&self, request: SubmitPrimeRequest) -> Result<SubmitOutcome, Error> {
        let now = self.clock.utc();
        let session = load_session(self.records.as_ref(), request.token.as_deref(), now).await?;
        ensure_booking_scope(&session, request.claimed_booking_id.as_deref())?;

        let guest_uuid = session
            .guest_uuid
            .clone()
            .ok_or_else(|| Error::forbidden("Guest identity required"))?;

        let guest = self
            .records
            .get(&format!("bookings/{}/{guest_uuid}", session.booking_id))
            .await
            .map_err(map_record_store_error)?
            .ok_or_else(|| Error::forbidden("Guest is not part of this booking"))?;
        let guest_name = guest
            .get("firstName")
            .and_then(Value::as_str)
            .unwrap_or("Guest")
            .to_owned();

        let request_type = request.request_type;
        let quota = request_type.quota();
        let key = format!("{}:{guest_uuid}", request_type.feature_key());
        if let RateLimitDecision::Blocked(block) = self.limiter.enforce(&key, quota, None).await {
            return Err(block.to_error());
        }

        self.validate_payload(request_type, &session.booking_id, &request.payload)
            .await?;

        let dedupe = Self::extension_dedupe_key(
            request_type,
            &session.booking_id,
            &guest_uuid,
            &request.payload,
        );
        if let Some(key) = dedupe.as_deref() {
            match self.counters.get(key).await {
                Ok(Some(request_id)) => {
                    return Ok(SubmitOutcome::Deduplicated { request_id });
                }
                Ok(None) => {}
                Err(error) => {
                    warn!(%error, "dedupe lookup failed; treating submission as new");
                }
            }
        }

        let record = PrimeRequestRecord {
            request_id: generate_request_id(request_type, now),
            request_type,
            status: PrimeRequestStatus::Pending,
            booking_id: session.booking_id.clone(),
            guest_uuid,
            guest_name,
            submitted_at: now,
            updated_at: now,
            note: request
                .note
                .map(|note| note.trim().to_owned())
                .filter(|note| !note.is_empty()),
            payload: request.payload,
            resolution: None,
        };

        let patch = fan_out_patch(&record)?;
        self.records
            .update(REQUESTS_ROOT, &patch)
            .await
            .map_err(map_record_store_error)?;

        if let Some(key) = dedupe.as_deref() {
            if let Err(error) = self
                .counters
                .put(key, &record.request_id, DEDUPE_TTL)
                .await
            {
                warn!(%error, "failed to record dedupe entry");
            }
        }

        Ok(SubmitOutcome::Created { record })
    }

    async fn update_status(
        &self,
        request: UpdateStatusRequest,
    ) -> Result<PrimeRequestRecord, Error> {
        let path = format!("{REQUESTS_ROOT}/byId/{}", request.request_id);
        let value = self
            .records
            .get(&path)
            .await
            .map_err(map_record_store_error)?
            .ok_or_else(|| Error::not_found("Request not found"))?;
        let mut record: PrimeRequestRecord = serde_json::from_value(value)
            .map_err(|error| Error::internal(format!("malformed request record: {error}")))?;

        if !record.status.can_transition_to(request.new_status) {
            return Err(Error::conflict(format!(
                "Cannot move request from {} to {}",
                record.status.as_str(),
                request.new_status.as_str()
            )));
        }

        let now = self.clock.utc();
        let patch = status_patch(
            &record.request_id,
            record.status,
            request.new_status,
            request.resolution.as_deref(),
            now,
        );
        self.records
            .update(REQUESTS_ROOT, &patch)
            .await
            .map_err(map_record_store_error)?;

        record.status = request.new_status;
        record.updated_at = now;
        if request.resolution.is_some() {
            record.resolution = request.resolution;
        }
        Ok(record)
    }
}
