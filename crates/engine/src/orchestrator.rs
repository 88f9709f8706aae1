// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job orchestration loop.
//!
//! One cycle lists the program's accounts, keeps the pending jobs and runs
//! each through fetch, execute, publish, cost and settle, strictly one at a
//! time. Nothing about a job is remembered between cycles: the ledger is the
//! only source of truth, so a job that fails here is simply seen again.

use crate::settlement::{SettlementClient, SettlementConfig, SettlementError};
use cm_adapters::{
    ExecutorAdapter, ExecutorError, JobMetadata, LedgerAdapter, LedgerError, StorageAdapter,
    StorageError,
};
use cm_core::{cost, decode_job, fallback_cid, format_tokens, Candidate, CostError, Pubkey};
use solana_sdk::signature::{Keypair, Signature};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// What to do when the result cannot be published
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishFallback {
    /// Settle with a locally derived content id (not retrievable from storage)
    LocalDigest,
    /// Abandon the job for this cycle
    Abort,
}

/// Orchestrator settings
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub program_id: Pubkey,
    /// Delay between cycles
    pub poll_interval: Duration,
    /// Delay between consecutive jobs within a cycle
    pub job_pacing: Duration,
    pub publish_fallback: PublishFallback,
    /// Re-read the job account right before settling
    pub recheck_before_settle: bool,
    pub settlement: SettlementConfig,
}

impl OrchestratorConfig {
    pub fn new(program_id: Pubkey) -> Self {
        Self {
            program_id,
            poll_interval: Duration::from_secs(10),
            job_pacing: Duration::from_secs(2),
            publish_fallback: PublishFallback::LocalDigest,
            recheck_before_settle: true,
            settlement: SettlementConfig::default(),
        }
    }
}

/// Why a job was abandoned for this cycle
#[derive(Debug, Error)]
pub enum JobError {
    #[error("fetch of code {cid} failed: {source}")]
    Fetch { cid: String, source: StorageError },
    #[error("code {cid} is not valid UTF-8")]
    CodeEncoding { cid: String },
    #[error("execution failed: {0}")]
    Execute(#[from] ExecutorError),
    #[error("publish failed: {0}")]
    Publish(StorageError),
    #[error("result serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Cost(#[from] CostError),
    #[error("claim check failed: {0}")]
    Claim(LedgerError),
    #[error("job is no longer pending ({0})")]
    NotPending(String),
    #[error("settlement failed: {0}")]
    Settlement(#[from] SettlementError),
}

/// A settled job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReceipt {
    pub result_cid: String,
    /// The result id was derived locally because publishing failed
    pub fallback_cid: bool,
    pub cost: u64,
    pub signature: Signature,
}

/// Pending jobs found by one listing
#[derive(Debug, Clone, Default)]
pub struct Listing {
    /// Accounts returned by the ledger
    pub accounts: usize,
    /// Accounts skipped because they did not decode
    pub undecodable: usize,
    pub pending: Vec<Candidate>,
}

/// Outcome of one cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub accounts: usize,
    pub undecodable: usize,
    pub pending: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Cancellation stopped the cycle before every pending job was visited
    pub interrupted: bool,
}

/// Running totals across cycles, for operator display only
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrchestratorStats {
    pub cycles: u64,
    pub processed: u64,
    pub failed: u64,
}

/// External capabilities the orchestrator drives
pub struct WorkerDeps<L, S, E> {
    pub ledger: L,
    pub storage: S,
    pub executor: E,
}

/// Polls the ledger and settles pending jobs
pub struct JobOrchestrator<L, S, E> {
    ledger: L,
    storage: S,
    executor: E,
    settlement: SettlementClient<L>,
    config: OrchestratorConfig,
    stats: OrchestratorStats,
}

impl<L, S, E> JobOrchestrator<L, S, E>
where
    L: LedgerAdapter,
    S: StorageAdapter,
    E: ExecutorAdapter,
{
    pub fn new(deps: WorkerDeps<L, S, E>, signer: Arc<Keypair>, config: OrchestratorConfig) -> Self {
        let settlement = SettlementClient::new(
            deps.ledger.clone(),
            config.program_id,
            signer,
            config.settlement,
        );
        Self {
            ledger: deps.ledger,
            storage: deps.storage,
            executor: deps.executor,
            settlement,
            config,
            stats: OrchestratorStats::default(),
        }
    }

    /// Identity that signs settlements
    pub fn worker(&self) -> Pubkey {
        self.settlement.worker()
    }

    pub fn stats(&self) -> OrchestratorStats {
        self.stats
    }

    /// Run cycles until `cancel` fires.
    ///
    /// Cancellation is observed between jobs and during every wait; a job
    /// already in the pipeline runs to completion first.
    pub async fn run(&mut self, cancel: CancellationToken) -> OrchestratorStats {
        tracing::info!(
            program = %self.config.program_id,
            worker = %self.worker(),
            interval_secs = self.config.poll_interval.as_secs(),
            "job loop started"
        );

        while !cancel.is_cancelled() {
            let report = self.run_cycle(&cancel).await;
            tracing::info!(
                check = self.stats.cycles,
                pending = report.pending,
                undecodable = report.undecodable,
                succeeded = report.succeeded,
                failed = report.failed,
                total_processed = self.stats.processed,
                "cycle finished"
            );
            if !sleep_or_cancel(self.config.poll_interval, &cancel).await {
                break;
            }
        }

        tracing::info!(
            cycles = self.stats.cycles,
            processed = self.stats.processed,
            failed = self.stats.failed,
            "job loop stopped"
        );
        self.stats
    }

    /// List, filter and process every pending job once.
    pub async fn run_cycle(&mut self, cancel: &CancellationToken) -> CycleReport {
        self.stats.cycles += 1;
        let mut report = CycleReport::default();

        let listing = match self.list_pending().await {
            Ok(listing) => listing,
            Err(e) => {
                tracing::error!(error = %e, "listing program accounts failed");
                return report;
            }
        };
        report.accounts = listing.accounts;
        report.undecodable = listing.undecodable;
        report.pending = listing.pending.len();

        if listing.pending.is_empty() {
            tracing::info!(
                accounts = listing.accounts,
                undecodable = listing.undecodable,
                "no pending jobs"
            );
            return report;
        }
        tracing::info!(
            accounts = listing.accounts,
            undecodable = listing.undecodable,
            pending = report.pending,
            "found pending jobs"
        );

        for (i, candidate) in listing.pending.iter().enumerate() {
            if cancel.is_cancelled()
                || (i > 0 && !sleep_or_cancel(self.config.job_pacing, cancel).await)
            {
                report.interrupted = true;
                break;
            }

            let start = Instant::now();
            match self.process_job(candidate).await {
                Ok(receipt) => {
                    report.succeeded += 1;
                    self.stats.processed += 1;
                    tracing::info!(
                        job = %candidate.address,
                        result_cid = %receipt.result_cid,
                        cost = receipt.cost,
                        signature = %receipt.signature,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "job completed"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    self.stats.failed += 1;
                    tracing::warn!(
                        job = %candidate.address,
                        title = %candidate.job.title,
                        error = %e,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "job abandoned, will retry next cycle"
                    );
                }
            }
        }
        report
    }

    /// Decode the program's accounts and keep the pending jobs.
    ///
    /// Accounts that fail to decode are skipped with a warning naming the
    /// address. Listing order is preserved.
    pub async fn list_pending(&self) -> Result<Listing, LedgerError> {
        let accounts = self.ledger.program_accounts(&self.config.program_id).await?;
        let mut listing = Listing { accounts: accounts.len(), ..Listing::default() };

        for account in accounts {
            match decode_job(&account.data) {
                Ok(job) if job.is_pending() => {
                    listing.pending.push(Candidate { address: account.address, job })
                }
                Ok(_) => {}
                Err(e) => {
                    listing.undecodable += 1;
                    tracing::warn!(address = %account.address, error = %e, "skipping undecodable account");
                }
            }
        }
        Ok(listing)
    }

    /// Run one job through the full pipeline.
    pub async fn process_job(&self, candidate: &Candidate) -> Result<JobReceipt, JobError> {
        let job = &candidate.job;
        tracing::info!(
            job = %candidate.address,
            title = %job.title,
            job_type = %job.job_type,
            code_cid = %job.code_cid,
            "processing job"
        );

        let code = self
            .storage
            .fetch(&job.code_cid)
            .await
            .map_err(|source| JobError::Fetch { cid: job.code_cid.clone(), source })?;
        let code_size = code.len() as u64;
        let code = String::from_utf8(code)
            .map_err(|_| JobError::CodeEncoding { cid: job.code_cid.clone() })?;

        let result = self.executor.run(&code, &JobMetadata::from_job(job)).await?;
        if result.is_success() {
            tracing::info!(job = %candidate.address, execution_ms = ?result.execution_time_ms, "execution succeeded");
        } else {
            tracing::warn!(
                job = %candidate.address,
                error = result.error.as_deref().unwrap_or("unknown"),
                "job code reported an error"
            );
        }

        let serialized = result.to_json_bytes()?;
        let object = serde_json::to_value(&result)?;
        let (result_cid, fallback) = match self.storage.publish(&object).await {
            Ok(cid) => (cid, false),
            Err(e) => match self.config.publish_fallback {
                PublishFallback::Abort => return Err(JobError::Publish(e)),
                PublishFallback::LocalDigest => {
                    let cid = fallback_cid(&serialized);
                    tracing::warn!(
                        job = %candidate.address,
                        error = %e,
                        %cid,
                        "publish failed, settling with a local digest id that storage cannot serve"
                    );
                    (cid, true)
                }
            },
        };

        let cost = cost::compute(code_size, serialized.len() as u64, result.execution_time())?;
        tracing::info!(
            job = %candidate.address,
            code_size,
            result_size = serialized.len(),
            cost,
            tokens = %format_tokens(cost),
            "computed cost"
        );

        if self.config.recheck_before_settle {
            self.claim(candidate).await?;
        }

        let signature = self.settlement.complete(&candidate.address, &result_cid, cost).await?;
        Ok(JobReceipt { result_cid, fallback_cid: fallback, cost, signature })
    }

    /// Confirm the job is still pending before spending a transaction on it.
    async fn claim(&self, candidate: &Candidate) -> Result<(), JobError> {
        let data = self.ledger.account_data(&candidate.address).await.map_err(JobError::Claim)?;
        let Some(data) = data else {
            return Err(JobError::NotPending("account closed".to_string()));
        };
        match decode_job(&data) {
            Ok(job) if job.is_pending() => Ok(()),
            Ok(job) => Err(JobError::NotPending(job.status.to_string())),
            Err(e) => Err(JobError::NotPending(format!("undecodable: {}", e))),
        }
    }
}

/// Sleep for `duration` unless cancelled first. Returns `false` on cancellation.
async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
