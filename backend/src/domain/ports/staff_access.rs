//! Driving ports for staff authentication and the staff token gate.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::domain::staff_role::StaffRole;
use crate::domain::Error;

/// A staff PIN login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinLoginRequest {
    /// The supplied PIN.
    pub pin: String,
    /// Caller identity for lockout tracking (client IP).
    pub client_key: String,
}

/// Successful PIN login payload.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PinLoginResponse {
    /// Signed identity assertion to exchange for a provider session.
    pub custom_token: String,
    /// Staff uid asserted in the token.
    pub uid: String,
    /// Role asserted in the token.
    pub role: StaffRole,
    /// Full custom claims carried by the token.
    #[schema(value_type = Object)]
    pub claims: Value,
}

/// Port for the PIN authentication flow.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PinAuthenticator: Send + Sync {
    /// Verify a PIN, enforcing lockout, and mint a signed token on success.
    async fn authenticate(&self, request: PinLoginRequest) -> Result<PinLoginResponse, Error>;
}

/// The gate-relevant parts of an inbound staff request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateRequest {
    /// Raw `Authorization` header value.
    pub authorization: Option<String>,
    /// Whether a recognized access-proxy assertion header was present.
    pub has_access_proxy_assertion: bool,
    /// Presented shared-secret header value.
    pub shared_secret: Option<String>,
}

/// A verified staff identity.
#[derive(Debug, Clone, PartialEq)]
pub struct StaffIdentity {
    /// Provider uid (or `sub`) of the staff member.
    pub uid: String,
    /// Resolved role.
    pub role: StaffRole,
    /// Merged claims the role was derived from.
    pub claims: Map<String, Value>,
}

/// Port for the two-layer staff access gate.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StaffAccessGate: Send + Sync {
    /// Apply the environment feature-gate, then verify the bearer token and
    /// derive a staff identity from its claims.
    async fn authorize(&self, request: GateRequest) -> Result<StaffIdentity, Error>;
}
