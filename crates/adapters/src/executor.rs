// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution backend adapter.
//!
//! The backend runs untrusted job code in its own sandbox and answers with a
//! structured [`ExecutionResult`]. Sandbox policy is entirely the backend's
//! concern.

use async_trait::async_trait;
use cm_core::{ExecutionResult, Job};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Errors from execution backend operations
#[derive(Debug, Clone, Error)]
pub enum ExecutorError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("backend returned HTTP {0}")]
    Status(u16),
    #[error("backend failure ({status_code}): {message}")]
    Backend { status_code: u64, message: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Job metadata forwarded alongside the code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobMetadata {
    pub job_title: String,
    pub job_type: &'static str,
    /// Base58 owner address
    pub owner: String,
}

impl JobMetadata {
    pub fn from_job(job: &Job) -> Self {
        Self {
            job_title: job.title.clone(),
            job_type: job.job_type.as_str(),
            owner: job.owner.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ExecutionRequest<'a> {
    code: &'a str,
    #[serde(flatten)]
    meta: &'a JobMetadata,
}

/// Adapter for running job code
#[async_trait]
pub trait ExecutorAdapter: Clone + Send + Sync + 'static {
    /// Run `code` and return its structured result.
    ///
    /// A script that raises still yields `Ok` with an error-status result;
    /// `Err` means the backend itself failed.
    async fn run(&self, code: &str, meta: &JobMetadata) -> Result<ExecutionResult, ExecutorError>;
}

/// Interpret a backend response.
///
/// Accepts either the result object itself or a function-invocation envelope
/// `{"statusCode": n, "body": "<json>"}`. Envelopes with `statusCode >= 500`
/// are backend failures.
pub fn parse_response(value: Value) -> Result<ExecutionResult, ExecutorError> {
    let result = match value.get("statusCode").and_then(Value::as_u64) {
        Some(status_code) => {
            let body = value.get("body").and_then(Value::as_str).unwrap_or("{}");
            let body: Value = serde_json::from_str(body)
                .map_err(|e| ExecutorError::Malformed(format!("envelope body: {}", e)))?;
            if status_code >= 500 {
                let message = body
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string();
                return Err(ExecutorError::Backend { status_code, message });
            }
            body
        }
        None => value,
    };
    serde_json::from_value(result).map_err(|e| ExecutorError::Malformed(e.to_string()))
}

/// Execution backend reached over HTTP with a bearer credential.
#[derive(Clone)]
pub struct HttpExecutorAdapter {
    http: reqwest::Client,
    url: String,
    token: String,
}

impl HttpExecutorAdapter {
    /// Every request is bounded by `timeout`.
    pub fn new(
        url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ExecutorError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExecutorError::Request(e.to_string()))?;
        Ok(Self { http, url: url.into(), token: token.into() })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ExecutorAdapter for HttpExecutorAdapter {
    async fn run(&self, code: &str, meta: &JobMetadata) -> Result<ExecutionResult, ExecutorError> {
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&ExecutionRequest { code, meta })
            .send()
            .await
            .map_err(|e| ExecutorError::Request(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExecutorError::Status(status.as_u16()));
        }
        let value: Value =
            response.json().await.map_err(|e| ExecutorError::Malformed(e.to_string()))?;
        parse_response(value)
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{ExecutorAdapter, ExecutorError, JobMetadata};
    use async_trait::async_trait;
    use cm_core::ExecutionResult;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Recorded execution request
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct ExecutorCall {
        pub code: String,
        pub meta: JobMetadata,
    }

    struct FakeExecutorState {
        response: Result<ExecutionResult, ExecutorError>,
        calls: Vec<ExecutorCall>,
    }

    /// Fake executor adapter for testing
    #[derive(Clone)]
    pub struct FakeExecutorAdapter {
        inner: Arc<Mutex<FakeExecutorState>>,
    }

    impl Default for FakeExecutorAdapter {
        fn default() -> Self {
            Self {
                inner: Arc::new(Mutex::new(FakeExecutorState {
                    response: Ok(ExecutionResult::success("ok", 50)),
                    calls: Vec::new(),
                })),
            }
        }
    }

    impl FakeExecutorAdapter {
        pub fn new() -> Self {
            Self::default()
        }

        /// Result returned by every run
        pub fn set_result(&self, result: ExecutionResult) {
            self.inner.lock().response = Ok(result);
        }

        pub fn fail(&self, error: ExecutorError) {
            self.inner.lock().response = Err(error);
        }

        /// Get all recorded calls
        pub fn calls(&self) -> Vec<ExecutorCall> {
            self.inner.lock().calls.clone()
        }
    }

    #[async_trait]
    impl ExecutorAdapter for FakeExecutorAdapter {
        async fn run(
            &self,
            code: &str,
            meta: &JobMetadata,
        ) -> Result<ExecutionResult, ExecutorError> {
            let mut inner = self.inner.lock();
            inner.calls.push(ExecutorCall { code: code.to_string(), meta: meta.clone() });
            inner.response.clone()
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{ExecutorCall, FakeExecutorAdapter};

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
