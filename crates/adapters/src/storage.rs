// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Content storage adapter: fetch job code by content id, publish results.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Public gateway used when none is configured.
pub const DEFAULT_GATEWAY: &str = "https://ipfs.io/ipfs/";

/// Pinning endpoint for JSON results.
pub const PIN_JSON_URL: &str = "https://api.pinata.cloud/pinning/pinJSONToIPFS";

/// Errors from storage operations
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("request failed: {0}")]
    Request(String),
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Adapter for content-addressed storage
#[async_trait]
pub trait StorageAdapter: Clone + Send + Sync + 'static {
    /// Fetch the bytes stored under `cid`.
    async fn fetch(&self, cid: &str) -> Result<Vec<u8>, StorageError>;

    /// Publish a JSON object and return its content id.
    async fn publish(&self, object: &Value) -> Result<String, StorageError>;
}

/// Build the gateway URL for a content id.
pub fn gateway_url(gateway: &str, cid: &str) -> String {
    if gateway.ends_with('/') {
        format!("{}{}", gateway, cid)
    } else {
        format!("{}/{}", gateway, cid)
    }
}

/// Request body for pinning `object`, named after the publish time.
pub fn pin_request(object: &Value, unix_secs: u64) -> Value {
    json!({
        "pinataContent": object,
        "pinataMetadata": { "name": format!("job_result_{}.json", unix_secs) },
    })
}

/// Extract the content id from a pin response.
pub fn parse_pin_response(body: &Value) -> Result<String, StorageError> {
    body.get("IpfsHash")
        .and_then(Value::as_str)
        .filter(|cid| !cid.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| StorageError::Malformed(format!("no IpfsHash in {}", body)))
}

/// IPFS gateway reads plus a pinning service for writes.
#[derive(Clone)]
pub struct IpfsStorageAdapter {
    http: reqwest::Client,
    gateway: String,
    pin_url: String,
    pin_token: Option<String>,
    fetch_attempts: u32,
    retry_delay: Duration,
}

impl IpfsStorageAdapter {
    /// Every request is bounded by `timeout`. Without `pin_token` every publish fails.
    pub fn new(
        gateway: impl Into<String>,
        pin_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::Request(e.to_string()))?;
        Ok(Self {
            http,
            gateway: gateway.into(),
            pin_url: PIN_JSON_URL.to_string(),
            pin_token,
            fetch_attempts: 3,
            retry_delay: Duration::from_millis(500),
        })
    }

    /// Retry budget for fetches (at least one attempt).
    pub fn with_fetch_attempts(mut self, attempts: u32) -> Self {
        self.fetch_attempts = attempts.max(1);
        self
    }

    pub fn can_publish(&self) -> bool {
        self.pin_token.is_some()
    }

    async fn fetch_once(&self, url: &str) -> Result<Vec<u8>, StorageError> {
        let response =
            self.http.get(url).send().await.map_err(|e| StorageError::Request(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Status { url: url.to_string(), status: status.as_u16() });
        }
        let bytes = response.bytes().await.map_err(|e| StorageError::Request(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl StorageAdapter for IpfsStorageAdapter {
    async fn fetch(&self, cid: &str) -> Result<Vec<u8>, StorageError> {
        let url = gateway_url(&self.gateway, cid);
        let mut attempt = 1;
        loop {
            match self.fetch_once(&url).await {
                Ok(bytes) => {
                    tracing::debug!(%cid, bytes = bytes.len(), attempt, "fetched content");
                    return Ok(bytes);
                }
                Err(e) if attempt < self.fetch_attempts => {
                    tracing::debug!(%cid, attempt, error = %e, "fetch failed, retrying");
                    tokio::time::sleep(self.retry_delay * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn publish(&self, object: &Value) -> Result<String, StorageError> {
        let token = self.pin_token.as_deref().ok_or(StorageError::NotConfigured("PINATA_JWT"))?;
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        let response = self
            .http
            .post(&self.pin_url)
            .bearer_auth(token)
            .json(&pin_request(object, now))
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Status { url: self.pin_url.clone(), status: status.as_u16() });
        }
        let body: Value =
            response.json().await.map_err(|e| StorageError::Malformed(e.to_string()))?;
        parse_pin_response(&body)
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{StorageAdapter, StorageError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Recorded storage call
    #[derive(Debug, Clone, PartialEq)]
    pub enum StorageCall {
        Fetch(String),
        Publish(Value),
    }

    struct FakeStorageState {
        content: HashMap<String, Vec<u8>>,
        publish_result: Result<String, StorageError>,
        calls: Vec<StorageCall>,
    }

    /// Fake storage adapter for testing
    #[derive(Clone)]
    pub struct FakeStorageAdapter {
        inner: Arc<Mutex<FakeStorageState>>,
    }

    impl Default for FakeStorageAdapter {
        fn default() -> Self {
            Self {
                inner: Arc::new(Mutex::new(FakeStorageState {
                    content: HashMap::new(),
                    publish_result: Ok("QmFakeResult".to_string()),
                    calls: Vec::new(),
                })),
            }
        }
    }

    impl FakeStorageAdapter {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make `bytes` fetchable under `cid`. Unknown ids fail to fetch.
        pub fn insert(&self, cid: &str, bytes: impl Into<Vec<u8>>) {
            self.inner.lock().content.insert(cid.to_string(), bytes.into());
        }

        /// Content id returned by every publish
        pub fn set_publish_cid(&self, cid: &str) {
            self.inner.lock().publish_result = Ok(cid.to_string());
        }

        pub fn fail_publish(&self, error: StorageError) {
            self.inner.lock().publish_result = Err(error);
        }

        /// Get all recorded calls
        pub fn calls(&self) -> Vec<StorageCall> {
            self.inner.lock().calls.clone()
        }

        /// Objects passed to publish, in order
        pub fn published(&self) -> Vec<Value> {
            self.inner
                .lock()
                .calls
                .iter()
                .filter_map(|c| match c {
                    StorageCall::Publish(v) => Some(v.clone()),
                    StorageCall::Fetch(_) => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl StorageAdapter for FakeStorageAdapter {
        async fn fetch(&self, cid: &str) -> Result<Vec<u8>, StorageError> {
            let mut inner = self.inner.lock();
            inner.calls.push(StorageCall::Fetch(cid.to_string()));
            inner
                .content
                .get(cid)
                .cloned()
                .ok_or_else(|| StorageError::Status { url: format!("fake://{}", cid), status: 404 })
        }

        async fn publish(&self, object: &Value) -> Result<String, StorageError> {
            let mut inner = self.inner.lock();
            inner.calls.push(StorageCall::Publish(object.clone()));
            inner.publish_result.clone()
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeStorageAdapter, StorageCall};

#[cfg(test)]
#[path = "storage_tests.rs"]
mod tests;
