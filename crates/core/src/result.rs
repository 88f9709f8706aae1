// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution results and the local fallback content id.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Execution time assumed when the backend omits `execution_time_ms`.
pub const DEFAULT_EXECUTION_TIME: Duration = Duration::from_millis(100);

/// Outcome of running the job's code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Error,
}

crate::simple_display! {
    ExecutionStatus {
        Success => "success",
        Error => "error",
    }
}

/// Structured output of one execution, published verbatim as the job result.
///
/// Only the fields the worker reads are modelled, and none is filled in when
/// absent. Everything else the backend sends (`timestamp`, `code_size`, ...)
/// is kept untouched in `extra`, so the published object and the size charge
/// cover exactly what the backend returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ExecutionResult {
    pub fn success(stdout: impl Into<String>, execution_time_ms: u64) -> Self {
        Self {
            status: ExecutionStatus::Success,
            stdout: Some(stdout.into()),
            stderr: None,
            error: None,
            execution_time_ms: Some(execution_time_ms),
            extra: serde_json::Map::new(),
        }
    }

    pub fn failure(error: impl Into<String>, execution_time_ms: u64) -> Self {
        Self {
            status: ExecutionStatus::Error,
            stdout: None,
            error: Some(error.into()),
            ..Self::success("", execution_time_ms)
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    /// Reported execution time, or [`DEFAULT_EXECUTION_TIME`] when absent.
    pub fn execution_time(&self) -> Duration {
        self.execution_time_ms.map(Duration::from_millis).unwrap_or(DEFAULT_EXECUTION_TIME)
    }

    /// Serialized form used both for publishing and for the result-size charge.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Content id derived locally when publishing fails.
///
/// `"Qm"` followed by the first 44 hex digits of SHA-256 over the serialized
/// result. It has the shape of a content id but nothing stores the bytes, so
/// it cannot be fetched.
pub fn fallback_cid(serialized: &[u8]) -> String {
    let digest = format!("{:x}", Sha256::digest(serialized));
    format!("Qm{}", &digest[..44])
}

#[cfg(test)]
#[path = "result_tests.rs"]
mod tests;
