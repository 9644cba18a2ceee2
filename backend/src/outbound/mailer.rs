//! HTTP mail dispatch adapter.
//!
//! Speaks a JSON mail API (bearer-authenticated POST). When no API key is
//! configured the adapter reports `NotConfigured` instead of failing, so
//! queue processing can complete in environments without a provider.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;
use serde_json::Value;

use crate::domain::ports::{DispatchError, DispatchReceipt, MessageDispatcher, OutboundMessage};

#[derive(Serialize)]
struct MailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
}

/// Dispatch adapter for the outbound mail provider.
pub struct HttpMailDispatcher {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
    from: String,
}

impl HttpMailDispatcher {
    /// Build an adapter for the given provider endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(
        endpoint: Url,
        api_key: Option<String>,
        from: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            api_key,
            from: from.into(),
        })
    }
}

/// Pull a human-readable message out of whatever error body the provider
/// returned: a bare string, `{message}`, or `{error: {message}}`.
fn extract_error_message(body: &str) -> String {
    let fallback = || {
        if body.trim().is_empty() {
            "dispatch failed".to_owned()
        } else {
            body.trim().to_owned()
        }
    };
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return fallback();
    };
    match &value {
        Value::String(message) => message.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| {
                map.get("error")
                    .and_then(|error| error.get("message"))
                    .and_then(Value::as_str)
            })
            .map(str::to_owned)
            .unwrap_or_else(fallback),
        _ => fallback(),
    }
}

#[async_trait]
impl MessageDispatcher for HttpMailDispatcher {
    async fn send(&self, message: &OutboundMessage) -> Result<DispatchReceipt, DispatchError> {
        let Some(api_key) = &self.api_key else {
            return Ok(DispatchReceipt::NotConfigured);
        };

        let request = MailRequest {
            from: &self.from,
            to: [message.to.as_str()],
            subject: &message.subject,
            text: &message.text,
        };
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|error| DispatchError::Transport {
                message: error.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(DispatchError::Http {
                status: status.as_u16(),
                message: extract_error_message(&body),
            });
        }

        let provider_id = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|value| value.get("id").and_then(Value::as_str).map(str::to_owned));
        Ok(DispatchReceipt::Delivered { provider_id })
    }
}
