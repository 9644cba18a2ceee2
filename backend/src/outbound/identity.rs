//! Identity-provider lookup adapter.
//!
//! Resolves bearer tokens through the provider's `accounts:lookup` endpoint.
//! A 400 response means the token is not recognized (`Ok(None)`); other
//! failures are surfaced as port errors.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;

use crate::domain::ports::{IdentityLookup, IdentityLookupError, IdentityRecord};

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    custom_attributes: Option<String>,
}

/// Identity lookup adapter for the provider REST API.
pub struct FirebaseIdentityLookup {
    client: Client,
    endpoint: Url,
}

impl FirebaseIdentityLookup {
    /// Build an adapter; `endpoint` already carries the API key query.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl IdentityLookup for FirebaseIdentityLookup {
    async fn lookup(
        &self,
        bearer_token: &str,
    ) -> Result<Option<IdentityRecord>, IdentityLookupError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&json!({ "idToken": bearer_token }))
            .send()
            .await
            .map_err(|error| IdentityLookupError::connection(error.to_string()))?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST {
            // The provider answers 400 for unknown or expired tokens.
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IdentityLookupError::request(status.as_u16(), body));
        }

        let decoded: LookupResponse = response
            .json()
            .await
            .map_err(|error| IdentityLookupError::connection(error.to_string()))?;
        Ok(decoded.users.into_iter().next().map(|user| IdentityRecord {
            uid: user.local_id,
            email: user.email,
            custom_attributes: user.custom_attributes,
        }))
    }
}
