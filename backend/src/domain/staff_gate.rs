//! Two-layer staff access gate.
//!
//! Layer one is an infrastructure feature-gate: in production, staff routes
//! are off unless explicitly enabled or fronted by a recognized access proxy
//! or shared secret. Layer two verifies the individual bearer token against
//! the identity provider and derives a role from its claims. The split lets
//! operators flip routes fully off independent of any single credential.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde_json::{Map, Value};

use crate::domain::ports::{
    GateRequest, IdentityLookup, IdentityLookupError, StaffAccessGate, StaffIdentity,
};
use crate::domain::staff_role::resolve_role;
use crate::domain::Error;

/// Environment name that makes the gate deny by default.
const PRODUCTION_ENVIRONMENT: &str = "production";
/// Fixed message returned when the feature-gate denies a request.
const GATE_DISABLED_MESSAGE: &str = "Staff access is not enabled in this environment";

/// Static feature-gate settings.
#[derive(Debug, Clone)]
pub struct StaffGateConfig {
    /// Deployment environment name; `production` denies by default.
    pub environment: String,
    /// Explicit override enabling staff routes in production.
    pub enabled: bool,
    /// Shared secret accepted from trusted infrastructure.
    pub shared_secret: Option<String>,
}

impl StaffGateConfig {
    fn passes_feature_gate(&self, request: &GateRequest) -> bool {
        if self.environment != PRODUCTION_ENVIRONMENT || self.enabled {
            return true;
        }
        if request.has_access_proxy_assertion {
            return true;
        }
        matches!(
            (&self.shared_secret, &request.shared_secret),
            (Some(expected), Some(presented)) if expected == presented
        )
    }
}

/// Decode the claims segment of a compact token without verifying it.
///
/// Verification happens provider-side through the identity lookup; the local
/// decode only recovers the claim payload to merge with provider attributes.
fn decode_unverified_claims(token: &str) -> Option<Map<String, Value>> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    match serde_json::from_slice(&bytes).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn merge_provider_claims(claims: &mut Map<String, Value>, custom_attributes: Option<&str>) {
    let Some(raw) = custom_attributes else {
        return;
    };
    if let Ok(Value::Object(custom)) = serde_json::from_str(raw) {
        // Provider-side values win over whatever the token carried.
        for (key, value) in custom {
            claims.insert(key, value);
        }
    }
}

fn extract_bearer(authorization: Option<&str>) -> Option<&str> {
    authorization?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Staff token gate service.
#[derive(Clone)]
pub struct StaffGateService<I> {
    identity: Arc<I>,
    config: StaffGateConfig,
}

impl<I> StaffGateService<I> {
    /// Create a gate with the given identity collaborator and settings.
    pub fn new(identity: Arc<I>, config: StaffGateConfig) -> Self {
        Self { identity, config }
    }
}

#[async_trait]
impl<I> StaffAccessGate for StaffGateService<I>
where
    I: IdentityLookup,
{
    async fn authorize(&self, request: GateRequest) -> Result<StaffIdentity, Error> {
        if !self.config.passes_feature_gate(&request) {
            return Err(Error::forbidden(GATE_DISABLED_MESSAGE));
        }

        let token = extract_bearer(request.authorization.as_deref())
            .ok_or_else(|| Error::unauthorized("Missing staff token"))?;

        let record = match self.identity.lookup(token).await {
            Ok(Some(record)) => record,
            Ok(None) => return Err(Error::unauthorized("Invalid staff token")),
            Err(IdentityLookupError::Connection { message }) => {
                return Err(Error::service_unavailable(format!(
                    "identity provider unavailable: {message}"
                )));
            }
            Err(IdentityLookupError::Request { .. }) => {
                return Err(Error::unauthorized("Invalid staff token"));
            }
        };

        let mut claims = decode_unverified_claims(token)
            .ok_or_else(|| Error::unauthorized("Invalid staff token"))?;
        merge_provider_claims(&mut claims, record.custom_attributes.as_deref());

        let role = resolve_role(&claims)
            .ok_or_else(|| Error::forbidden("Staff role required"))?;

        let uid = claims
            .get("uid")
            .and_then(Value::as_str)
            .or_else(|| claims.get("sub").and_then(Value::as_str))
            .map(str::to_owned)
            .ok_or_else(|| Error::unauthorized("Staff token missing uid"))?;

        Ok(StaffIdentity { uid, role, claims })
    }
}
