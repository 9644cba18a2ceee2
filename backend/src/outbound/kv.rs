//! REST adapter for the expiring counter store.
//!
//! The backing namespace exposes `GET`/`PUT`/`DELETE /values/<key>` with an
//! `expiration_ttl` query parameter on writes; a missing key reads as 404.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};

use crate::domain::ports::{CounterStore, CounterStoreError};

/// Counter store adapter speaking the namespace REST protocol.
pub struct RestCounterStore {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl RestCounterStore {
    /// Build an adapter for the given namespace base URL.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(
        base_url: Url,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    fn endpoint(&self, key: &str) -> Result<Url, CounterStoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| CounterStoreError::connection("counter store base URL cannot be a base"))?
            .push("values")
            .push(key);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn map_transport(error: reqwest::Error) -> CounterStoreError {
    if let Some(status) = error.status() {
        CounterStoreError::request(status.as_u16(), error.to_string())
    } else {
        CounterStoreError::connection(error.to_string())
    }
}

#[async_trait]
impl CounterStore for RestCounterStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CounterStoreError> {
        let url = self.endpoint(key)?;
        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(map_transport)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = response.status();
        let body = response.text().await.map_err(map_transport)?;
        if status.is_success() {
            Ok(Some(body))
        } else {
            Err(CounterStoreError::request(status.as_u16(), body))
        }
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CounterStoreError> {
        let mut url = self.endpoint(key)?;
        url.query_pairs_mut()
            .append_pair("expiration_ttl", &ttl.as_secs().max(60).to_string());
        let response = self
            .authorize(self.client.put(url))
            .body(value.to_owned())
            .send()
            .await
            .map_err(map_transport)?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(CounterStoreError::request(status.as_u16(), body))
        }
    }

    async fn delete(&self, key: &str) -> Result<(), CounterStoreError> {
        let url = self.endpoint(key)?;
        let response = self
            .authorize(self.client.delete(url))
            .send()
            .await
            .map_err(map_transport)?;
        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(CounterStoreError::request(
                status.as_u16(),
                "delete rejected".to_owned(),
            ))
        }
    }
}
