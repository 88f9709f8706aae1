// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Settlement: sign, submit and confirm a job's `complete_job` instruction.
//!
//! A failed settlement leaves the job pending on the ledger, so the next
//! cycle picks it up again. Re-settling a job that another worker already
//! completed is rejected by the program and surfaces here as an ordinary
//! failure.

use cm_adapters::{LedgerAdapter, LedgerError, TxStatus};
use cm_core::CompleteJob;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::Transaction;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Confirmation polling budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementConfig {
    /// Number of status polls before giving up
    pub confirm_attempts: u32,
    /// Delay before each poll
    pub confirm_delay: Duration,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self { confirm_attempts: 5, confirm_delay: Duration::from_secs(2) }
    }
}

/// Errors from settling a job
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("could not fetch blockhash: {0}")]
    Blockhash(LedgerError),
    #[error("submission failed: {0}")]
    Submit(LedgerError),
    #[error("transaction {signature} rejected: {reason}")]
    Rejected { signature: Signature, reason: String },
    #[error("transaction {signature} not confirmed after {attempts} polls")]
    Unconfirmed { signature: Signature, attempts: u32 },
}

/// Builds and confirms completion transactions signed by the worker.
pub struct SettlementClient<L> {
    ledger: L,
    program_id: Pubkey,
    signer: Arc<Keypair>,
    config: SettlementConfig,
}

impl<L: LedgerAdapter> SettlementClient<L> {
    pub fn new(ledger: L, program_id: Pubkey, signer: Arc<Keypair>, config: SettlementConfig) -> Self {
        Self { ledger, program_id, signer, config }
    }

    /// The worker identity that signs and pays for settlements
    pub fn worker(&self) -> Pubkey {
        self.signer.pubkey()
    }

    /// `complete_job` instruction: job account writable, worker signing read-only.
    pub fn instruction(&self, job_address: &Pubkey, completion: &CompleteJob) -> Instruction {
        Instruction::new_with_bytes(
            self.program_id,
            &completion.encode(),
            vec![
                AccountMeta::new(*job_address, false),
                AccountMeta::new_readonly(self.signer.pubkey(), true),
            ],
        )
    }

    /// Settle a job. `Ok` only once the ledger reports the transaction confirmed.
    pub async fn complete(
        &self,
        job_address: &Pubkey,
        result_cid: &str,
        cost: u64,
    ) -> Result<Signature, SettlementError> {
        let completion = CompleteJob::new(result_cid, cost);
        let blockhash = self.ledger.latest_blockhash().await.map_err(SettlementError::Blockhash)?;

        let payer = self.signer.pubkey();
        let tx = Transaction::new_signed_with_payer(
            &[self.instruction(job_address, &completion)],
            Some(&payer),
            &[self.signer.as_ref()],
            blockhash,
        );

        let signature = self.ledger.submit(&tx).await.map_err(SettlementError::Submit)?;
        tracing::info!(job = %job_address, %signature, "settlement submitted");

        self.await_confirmation(signature).await
    }

    async fn await_confirmation(&self, signature: Signature) -> Result<Signature, SettlementError> {
        let attempts = self.config.confirm_attempts;
        for attempt in 1..=attempts {
            tokio::time::sleep(self.config.confirm_delay).await;
            match self.ledger.status(&signature).await {
                Ok(TxStatus::Confirmed) => {
                    tracing::info!(%signature, attempt, "settlement confirmed");
                    return Ok(signature);
                }
                Ok(TxStatus::Failed(reason)) => {
                    return Err(SettlementError::Rejected { signature, reason });
                }
                Ok(status) => tracing::debug!(%signature, attempt, %status, "awaiting confirmation"),
                Err(e) => tracing::debug!(%signature, attempt, error = %e, "status poll failed"),
            }
        }
        Err(SettlementError::Unconfirmed { signature, attempts })
    }
}

#[cfg(test)]
#[path = "settlement_tests.rs"]
mod tests;
