//! Port abstraction for the identity-provider lookup collaborator.
//!
//! The staff token gate verifies bearer tokens by asking the identity
//! provider to resolve them. The provider returns the canonical user record
//! including any custom attributes it stores as a JSON-encoded string.

use async_trait::async_trait;

use super::define_port_error;

define_port_error! {
    /// Errors raised by identity lookup adapters.
    pub enum IdentityLookupError {
        /// The provider could not be reached.
        Connection { message: String } => "identity lookup connection failed: {message}",
        /// The provider rejected the request for a reason other than an
        /// invalid token.
        Request { status: u16, message: String } => "identity lookup failed ({status}): {message}",
    }
}

/// Provider-side record for a verified identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRecord {
    /// Provider-assigned user identifier.
    pub uid: String,
    /// Primary email, when the provider knows one.
    pub email: Option<String>,
    /// JSON-encoded custom claims attached to the identity.
    pub custom_attributes: Option<String>,
}

/// Port for bearer-token verification against the identity provider.
///
/// Returns `Ok(None)` for tokens the provider does not recognize; transport
/// and provider failures are errors.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    /// Resolve a bearer token to the identity it belongs to.
    async fn lookup(&self, bearer_token: &str)
        -> Result<Option<IdentityRecord>, IdentityLookupError>;
}

/// Fixture implementation recognizing no tokens.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullIdentityLookup;

#[async_trait]
impl IdentityLookup for NullIdentityLookup {
    async fn lookup(
        &self,
        _bearer_token: &str,
    ) -> Result<Option<IdentityRecord>, IdentityLookupError> {
        Ok(None)
    }
}
