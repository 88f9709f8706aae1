// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker startup: load the signing key, build adapters, probe the ledger.

use std::sync::Arc;

use cm_adapters::{HttpExecutorAdapter, IpfsStorageAdapter, LedgerAdapter, RpcLedgerAdapter};
use cm_engine::{JobOrchestrator, WorkerDeps};
use solana_sdk::signature::{read_keypair_file, Keypair, Signer};
use tracing::{info, warn};

use super::{Config, LifecycleError};

/// Orchestrator with the production adapters
pub type Worker = JobOrchestrator<RpcLedgerAdapter, IpfsStorageAdapter, HttpExecutorAdapter>;

/// Start the worker.
///
/// The keypair is loaded before any network access so a bad key path fails
/// fast. The ledger is probed once; an unreachable ledger is fatal.
pub async fn startup(config: &Config) -> Result<Worker, LifecycleError> {
    let signer = load_keypair(config)?;

    let ledger = RpcLedgerAdapter::new(config.rpc_url.clone(), config.http_timeout);
    let version = ledger.version().await?;
    info!(rpc = %config.rpc_url, %version, "ledger reachable");

    let storage = IpfsStorageAdapter::new(
        config.gateway.clone(),
        config.pinata_jwt.clone(),
        config.http_timeout,
    )?
    .with_fetch_attempts(config.fetch_attempts);
    if !storage.can_publish() {
        warn!("PINATA_JWT not set: results cannot be published and will settle with a local digest id");
    }

    let executor = HttpExecutorAdapter::new(
        config.executor_url.clone(),
        config.executor_token.clone(),
        config.http_timeout,
    )?;

    info!(
        program = %config.program_id,
        worker = %signer.pubkey(),
        executor = %executor.url(),
        gateway = %config.gateway,
        interval_secs = config.poll_interval.as_secs(),
        require_publish = config.require_publish,
        "worker configured"
    );

    Ok(JobOrchestrator::new(
        WorkerDeps { ledger, storage, executor },
        signer,
        config.orchestrator_config(),
    ))
}

pub(super) fn load_keypair(config: &Config) -> Result<Arc<Keypair>, LifecycleError> {
    read_keypair_file(&config.keypair_path).map(Arc::new).map_err(|e| LifecycleError::Keypair {
        path: config.keypair_path.clone(),
        message: e.to_string(),
    })
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
