// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the worker.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use cm_adapters::DEFAULT_GATEWAY;

/// Set but empty counts as unset.
fn non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn parsed<T: FromStr>(name: &str) -> Option<T> {
    non_empty(name).and_then(|s| s.trim().parse::<T>().ok())
}

/// Ledger JSON-RPC endpoint (`SOLANA_RPC_URL`). Required.
pub fn rpc_url() -> Option<String> {
    non_empty("SOLANA_RPC_URL")
}

/// Execution backend endpoint (`CM_EXECUTOR_URL`). Required.
pub fn executor_url() -> Option<String> {
    non_empty("CM_EXECUTOR_URL")
}

/// Bearer credential for the execution backend (`CM_EXECUTOR_TOKEN`). Required.
pub fn executor_token() -> Option<String> {
    non_empty("CM_EXECUTOR_TOKEN")
}

/// Gateway prefix for code fetches
pub fn ipfs_gateway() -> String {
    non_empty("IPFS_GATEWAY").unwrap_or_else(|| DEFAULT_GATEWAY.to_string())
}

/// Pinning-service credential. Without it every publish falls back.
pub fn pinata_jwt() -> Option<String> {
    non_empty("PINATA_JWT")
}

/// Delay between cycles (default 10s)
pub fn poll_interval() -> Duration {
    parsed::<u64>("CM_POLL_INTERVAL_SECS")
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(10))
}

/// Delay between jobs within a cycle (default 2s)
pub fn job_pacing() -> Duration {
    parsed::<u64>("CM_JOB_PACING_MS")
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(2))
}

/// Timeout applied to every outbound call (default 30s)
pub fn http_timeout() -> Duration {
    parsed::<u64>("CM_HTTP_TIMEOUT_MS")
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(30))
}

pub fn confirm_attempts() -> u32 {
    parsed("CM_CONFIRM_ATTEMPTS").unwrap_or(5)
}

pub fn confirm_delay() -> Duration {
    parsed::<u64>("CM_CONFIRM_DELAY_MS")
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(2))
}

pub fn fetch_attempts() -> u32 {
    parsed("CM_FETCH_ATTEMPTS").unwrap_or(3)
}

/// `CM_REQUIRE_PUBLISH=1` turns a publish failure into a job failure.
pub fn require_publish() -> bool {
    matches!(non_empty("CM_REQUIRE_PUBLISH").as_deref(), Some("1") | Some("true"))
}

/// Log filter directive: `CM_LOG` > `RUST_LOG` > `info`
pub fn log_filter() -> String {
    non_empty("CM_LOG").or_else(|| non_empty("RUST_LOG")).unwrap_or_else(|| "info".to_string())
}

/// Directory for the rotating log file, if file logging is wanted
pub fn log_dir() -> Option<PathBuf> {
    non_empty("CM_LOG_DIR").map(PathBuf::from)
}

/// `~/.config/solana/id.json`
pub fn default_keypair_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("solana").join("id.json"))
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
