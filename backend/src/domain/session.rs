//! Guest session tokens and their validation.
//!
//! A session scopes a guest to one booking via an opaque bearer token stored
//! under `guestSessionsByToken/<token>`. Sessions are written once and never
//! mutated; re-verification mints a fresh token. Expiry derives from the
//! booking's checkout date plus a fixed grace window, with a 30-day fallback
//! when the checkout date cannot be parsed.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use mockable::Clock;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

use crate::domain::ports::{
    GuestSessionCommand, GuestSessionQuery, IssueSessionRequest, IssuedSession, RecordStore,
    RecordStoreError,
};
use crate::domain::rate_limit::{quotas, RateLimitDecision, RateLimiter};
use crate::domain::{CounterStore, Error};

/// Hours of grace after the checkout date before a session expires.
const CHECKOUT_GRACE_HOURS: i64 = 48;
/// Session lifetime when the checkout date is missing or unparsable.
const FALLBACK_LIFETIME_DAYS: i64 = 30;
/// Random bytes per session token; rendered as lowercase hex.
const TOKEN_BYTES: usize = 24;

/// A guest's authenticated scope over one booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GuestSession {
    /// Booking the session is scoped to.
    pub booking_id: String,
    /// Guest identity inside the booking, when known.
    pub guest_uuid: Option<String>,
    /// When the session was minted.
    pub created_at: DateTime<Utc>,
    /// When the session stops being accepted.
    pub expires_at: DateTime<Utc>,
}

/// Store path for a session token.
pub(crate) fn session_path(token: &str) -> String {
    format!("guestSessionsByToken/{token}")
}

/// Derive a session expiry from an optional `YYYY-MM-DD` checkout date.
pub fn session_expiry(checkout_date: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    checkout_date
        .and_then(|raw| NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|checkout| checkout.and_utc() + chrono::Duration::hours(CHECKOUT_GRACE_HOURS))
        .unwrap_or_else(|| now + chrono::Duration::days(FALLBACK_LIFETIME_DAYS))
}

fn mint_token() -> String {
    let mut bytes = [0_u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub(crate) fn map_record_store_error(error: RecordStoreError) -> Error {
    match error {
        RecordStoreError::Connection { message } => {
            Error::service_unavailable(format!("record store unavailable: {message}"))
        }
        RecordStoreError::Request { status, message } => {
            Error::internal(format!("record store request failed ({status}): {message}"))
        }
        RecordStoreError::Serialization { message } => {
            Error::internal(format!("record store serialization failed: {message}"))
        }
    }
}

/// Load and expiry-check the session behind `token`.
///
/// Shared by the session endpoints and every guest-facing service.
pub(crate) async fn load_session<S>(
    records: &S,
    token: Option<&str>,
    now: DateTime<Utc>,
) -> Result<GuestSession, Error>
where
    S: RecordStore + ?Sized,
{
    let token = token
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| Error::invalid_request("Missing guest session token"))?;

    let value = records
        .get(&session_path(token))
        .await
        .map_err(map_record_store_error)?
        .ok_or_else(|| Error::not_found("Session not found"))?;

    let session: GuestSession = serde_json::from_value(value)
        .map_err(|error| Error::internal(format!("malformed session record: {error}")))?;

    if session.expires_at <= now {
        return Err(Error::gone("Session expired"));
    }

    Ok(session)
}

/// Reject sessions whose booking does not match the caller's claimed one.
pub(crate) fn ensure_booking_scope(
    session: &GuestSession,
    claimed_booking_id: Option<&str>,
) -> Result<(), Error> {
    match claimed_booking_id {
        Some(claimed) if claimed != session.booking_id => {
            Err(Error::forbidden("Booking does not match session"))
        }
        _ => Ok(()),
    }
}

/// Session issue/validate service over the record store.
#[derive(Clone)]
pub struct GuestSessionService<S, C> {
    records: Arc<S>,
    limiter: RateLimiter<C>,
    clock: Arc<dyn Clock>,
}

impl<S, C> GuestSessionService<S, C> {
    /// Create a new session service.
    pub fn new(records: Arc<S>, limiter: RateLimiter<C>, clock: Arc<dyn Clock>) -> Self {
        Self {
            records,
            limiter,
            clock,
        }
    }
}

#[async_trait]
impl<S, C> GuestSessionQuery for GuestSessionService<S, C>
where
    S: RecordStore,
    C: CounterStore,
{
    async fn validate<'a>(&self, token: Option<&'a str>) -> Result<GuestSession, Error> {
        load_session(self.records.as_ref(), token, self.clock.utc()).await
    }
}

#[async_trait]
impl<S, C> GuestSessionCommand for GuestSessionService<S, C>
where
    S: RecordStore,
    C: CounterStore,
{
    async fn issue(&self, request: IssueSessionRequest) -> Result<IssuedSession, Error> {
        let key = format!("lookup:{}", request.client_key);
        if let RateLimitDecision::Blocked(block) = self
            .limiter
            .enforce(&key, quotas::LOOKUP, None)
            .await
        {
            return Err(block.to_error());
        }

        let booking_id = request.booking_id.trim();
        if booking_id.is_empty() {
            return Err(Error::invalid_request("Booking id is required"));
        }

        let booking = self
            .records
            .get(&format!("bookings/{booking_id}"))
            .await
            .map_err(map_record_store_error)?;
        if booking.is_none() {
            return Err(Error::not_found("Booking not found"));
        }

        if let Some(guest_uuid) = request
            .guest_uuid
            .as_deref()
            .map(str::trim)
            .filter(|uuid| !uuid.is_empty())
        {
            let guest = self
                .records
                .get(&format!("bookings/{booking_id}/{guest_uuid}"))
                .await
                .map_err(map_record_store_error)?;
            if guest.is_none() {
                return Err(Error::forbidden("Guest is not part of this booking"));
            }
        }

        let now = self.clock.utc();
        let session = GuestSession {
            booking_id: booking_id.to_owned(),
            guest_uuid: request
                .guest_uuid
                .map(|uuid| uuid.trim().to_owned())
                .filter(|uuid| !uuid.is_empty()),
            created_at: now,
            expires_at: session_expiry(request.checkout_date.as_deref(), now),
        };

        let token = mint_token();
        let value = serde_json::to_value(&session)
            .map_err(|error| Error::internal(format!("failed to serialize session: {error}")))?;
        self.records
            .set(&session_path(&token), &value)
            .await
            .map_err(map_record_store_error)?;

        if session.expires_at - now > chrono::Duration::days(FALLBACK_LIFETIME_DAYS) {
            warn!(
                booking_id = %session.booking_id,
                "session expiry unusually far in the future"
            );
        }

        Ok(IssuedSession { token, session })
    }
}
