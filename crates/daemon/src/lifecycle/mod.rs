// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker lifecycle: configuration and startup checks.

pub mod shutdown;
mod startup;
pub use startup::{startup, Worker};

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use cm_adapters::{ExecutorError, LedgerError, StorageError};
use cm_core::Pubkey;
use cm_engine::{OrchestratorConfig, PublishFallback, SettlementConfig};
use thiserror::Error;

use crate::env;

/// Worker configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Marketplace program whose job accounts are polled
    pub program_id: Pubkey,
    /// Signing keypair file
    pub keypair_path: PathBuf,
    pub rpc_url: String,
    pub executor_url: String,
    pub executor_token: String,
    pub gateway: String,
    /// Pinning credential; `None` means every publish falls back
    pub pinata_jwt: Option<String>,
    pub poll_interval: Duration,
    pub job_pacing: Duration,
    /// Bound on every outbound call
    pub http_timeout: Duration,
    pub confirm_attempts: u32,
    pub confirm_delay: Duration,
    pub fetch_attempts: u32,
    pub require_publish: bool,
}

impl Config {
    /// Build the configuration from the command line and the environment.
    ///
    /// `keypair_path` falls back to the Solana CLI default location.
    pub fn load(program_id: &str, keypair_path: Option<PathBuf>) -> Result<Self, LifecycleError> {
        let program_id = Pubkey::from_str(program_id.trim()).map_err(|e| {
            LifecycleError::InvalidProgramId { value: program_id.to_string(), reason: e.to_string() }
        })?;
        let keypair_path = keypair_path
            .or_else(env::default_keypair_path)
            .ok_or(LifecycleError::NoKeypairPath)?;

        Ok(Self {
            program_id,
            keypair_path,
            rpc_url: env::rpc_url().ok_or(LifecycleError::MissingEnv("SOLANA_RPC_URL"))?,
            executor_url: env::executor_url().ok_or(LifecycleError::MissingEnv("CM_EXECUTOR_URL"))?,
            executor_token: env::executor_token()
                .ok_or(LifecycleError::MissingEnv("CM_EXECUTOR_TOKEN"))?,
            gateway: env::ipfs_gateway(),
            pinata_jwt: env::pinata_jwt(),
            poll_interval: env::poll_interval(),
            job_pacing: env::job_pacing(),
            http_timeout: env::http_timeout(),
            confirm_attempts: env::confirm_attempts(),
            confirm_delay: env::confirm_delay(),
            fetch_attempts: env::fetch_attempts(),
            require_publish: env::require_publish(),
        })
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            program_id: self.program_id,
            poll_interval: self.poll_interval,
            job_pacing: self.job_pacing,
            publish_fallback: if self.require_publish {
                PublishFallback::Abort
            } else {
                PublishFallback::LocalDigest
            },
            recheck_before_settle: true,
            settlement: SettlementConfig {
                confirm_attempts: self.confirm_attempts,
                confirm_delay: self.confirm_delay,
            },
        }
    }
}

/// Errors that stop the worker before the job loop starts
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("invalid program id {value:?}: {reason}")]
    InvalidProgramId { value: String, reason: String },

    #[error("no keypair path given and no home directory to find the default")]
    NoKeypairPath,

    #[error("could not load keypair from {path}: {message}")]
    Keypair { path: PathBuf, message: String },

    #[error("{0} is not set")]
    MissingEnv(&'static str),

    #[error("ledger unreachable: {0}")]
    Ledger(#[from] LedgerError),

    #[error("storage setup failed: {0}")]
    Storage(#[from] StorageError),

    #[error("executor setup failed: {0}")]
    Executor(#[from] ExecutorError),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod test_helpers;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
