//! REST adapter for the hierarchical JSON record store.
//!
//! This adapter owns transport details only: path-to-URL mapping (documents
//! are addressed as `<base>/<path>.json`), the optional auth query
//! parameter, HTTP error mapping, and JSON decoding. Multi-path patches map
//! onto the store's native PATCH semantics, where slash-delimited keys in
//! the body are applied relative to the request path as one write.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::{Map, Value};

use crate::domain::ports::{RecordStore, RecordStoreError};

/// Record store adapter speaking the store's REST protocol.
pub struct FirebaseRestStore {
    client: Client,
    base_url: Url,
    auth_token: Option<String>,
}

impl FirebaseRestStore {
    /// Build an adapter for the given database base URL.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(
        base_url: Url,
        auth_token: Option<String>,
        timeout: std::time::Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            auth_token,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, RecordStoreError> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return Err(RecordStoreError::serialization("empty record path"));
        }
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                RecordStoreError::serialization("record store base URL cannot be a base")
            })?;
            let mut parts = trimmed.split('/').peekable();
            while let Some(part) = parts.next() {
                if parts.peek().is_none() {
                    segments.push(&format!("{part}.json"));
                } else {
                    segments.push(part);
                }
            }
        }
        if let Some(token) = &self.auth_token {
            url.query_pairs_mut().append_pair("auth", token);
        }
        Ok(url)
    }

    async fn decode(response: reqwest::Response) -> Result<Value, RecordStoreError> {
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|error| RecordStoreError::connection(error.to_string()))?;
        if !status.is_success() {
            return Err(RecordStoreError::request(
                status.as_u16(),
                String::from_utf8_lossy(&body).into_owned(),
            ));
        }
        serde_json::from_slice(&body)
            .map_err(|error| RecordStoreError::serialization(error.to_string()))
    }
}

fn map_transport(error: reqwest::Error) -> RecordStoreError {
    if let Some(status) = error.status() {
        RecordStoreError::request(status.as_u16(), error.to_string())
    } else {
        RecordStoreError::connection(error.to_string())
    }
}

#[async_trait]
impl RecordStore for FirebaseRestStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, RecordStoreError> {
        let url = self.endpoint(path)?;
        let response = self.client.get(url).send().await.map_err(map_transport)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let value = Self::decode(response).await?;
        Ok((!value.is_null()).then_some(value))
    }

    async fn set(&self, path: &str, value: &Value) -> Result<(), RecordStoreError> {
        let url = self.endpoint(path)?;
        let response = self
            .client
            .put(url)
            .json(value)
            .send()
            .await
            .map_err(map_transport)?;
        Self::decode(response).await.map(|_| ())
    }

    async fn update(&self, path: &str, patch: &Map<String, Value>) -> Result<(), RecordStoreError> {
        let url = self.endpoint(path)?;
        let response = self
            .client
            .patch(url)
            .json(patch)
            .send()
            .await
            .map_err(map_transport)?;
        Self::decode(response).await.map(|_| ())
    }

    async fn delete(&self, path: &str) -> Result<(), RecordStoreError> {
        let url = self.endpoint(path)?;
        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(map_transport)?;
        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(RecordStoreError::request(
                status.as_u16(),
                "delete rejected".to_owned(),
            ))
        }
    }
}
