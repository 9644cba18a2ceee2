//! Driving ports for guest session issue and validation.

use async_trait::async_trait;

use crate::domain::session::GuestSession;
use crate::domain::Error;

/// Input for minting a session after a successful booking lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueSessionRequest {
    /// Booking the session scopes to.
    pub booking_id: String,
    /// Guest identity inside the booking, when the lookup resolved one.
    pub guest_uuid: Option<String>,
    /// Checkout date (`YYYY-MM-DD`) driving the expiry derivation.
    pub checkout_date: Option<String>,
    /// Caller identity for rate limiting (client IP).
    pub client_key: String,
}

/// A freshly minted session and its bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedSession {
    /// Opaque bearer token.
    pub token: String,
    /// The stored session.
    pub session: GuestSession,
}

/// Port for minting guest sessions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GuestSessionCommand: Send + Sync {
    /// Mint a session for a verified booking lookup.
    async fn issue(&self, request: IssueSessionRequest) -> Result<IssuedSession, Error>;
}

/// Port for validating guest session tokens.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GuestSessionQuery: Send + Sync {
    /// Look up and expiry-check the session behind `token`.
    async fn validate<'a>(&self, token: Option<&'a str>) -> Result<GuestSession, Error>;
}
