// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ledger adapter: account listing, transaction submission and status.

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors from ledger operations
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("{op} failed: {message}")]
    Request { op: &'static str, message: String },
}

impl LedgerError {
    pub fn request(op: &'static str, e: impl std::fmt::Display) -> Self {
        LedgerError::Request { op, message: e.to_string() }
    }
}

/// A program-owned account as returned by the listing query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAccount {
    pub address: Pubkey,
    pub data: Vec<u8>,
}

/// What the ledger reports for a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    /// Included at the configured commitment.
    Confirmed,
    /// Seen but not yet at the configured commitment.
    Pending,
    /// Not known to the ledger (yet).
    Unknown,
    /// Included but the program rejected it.
    Failed(String),
}

cm_core::simple_display! {
    TxStatus {
        Confirmed => "confirmed",
        Pending => "pending",
        Unknown => "unknown",
        Failed(..) => "failed",
    }
}

/// Map a reported signature status onto [`TxStatus`].
pub fn classify_status(err: Option<String>, reached_commitment: bool) -> TxStatus {
    match (err, reached_commitment) {
        (Some(err), _) => TxStatus::Failed(err),
        (None, true) => TxStatus::Confirmed,
        (None, false) => TxStatus::Pending,
    }
}

/// Adapter for the ledger holding job accounts
#[async_trait]
pub trait LedgerAdapter: Clone + Send + Sync + 'static {
    /// List every account owned by `program_id`, in whatever order the ledger returns them.
    async fn program_accounts(&self, program_id: &Pubkey) -> Result<Vec<RawAccount>, LedgerError>;

    /// Read one account's data. `None` if the account does not exist.
    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError>;

    /// Recent blockhash to anchor a new transaction.
    async fn latest_blockhash(&self) -> Result<Hash, LedgerError>;

    /// Submit a signed transaction.
    async fn submit(&self, tx: &Transaction) -> Result<Signature, LedgerError>;

    /// Current status of a submitted transaction.
    async fn status(&self, signature: &Signature) -> Result<TxStatus, LedgerError>;

    /// Ledger software version, used as a reachability probe.
    async fn version(&self) -> Result<String, LedgerError>;
}

/// Ledger adapter over the JSON-RPC API.
#[derive(Clone)]
pub struct RpcLedgerAdapter {
    client: Arc<RpcClient>,
    commitment: CommitmentConfig,
}

impl RpcLedgerAdapter {
    /// Every request is bounded by `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let commitment = CommitmentConfig::confirmed();
        Self {
            client: Arc::new(RpcClient::new_with_timeout_and_commitment(
                url.into(),
                timeout,
                commitment,
            )),
            commitment,
        }
    }

    pub fn url(&self) -> String {
        self.client.url()
    }
}

#[async_trait]
impl LedgerAdapter for RpcLedgerAdapter {
    async fn program_accounts(&self, program_id: &Pubkey) -> Result<Vec<RawAccount>, LedgerError> {
        let accounts = self
            .client
            .get_program_accounts(program_id)
            .await
            .map_err(|e| LedgerError::request("getProgramAccounts", e))?;
        Ok(accounts
            .into_iter()
            .map(|(address, account)| RawAccount { address, data: account.data })
            .collect())
    }

    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError> {
        let response = self
            .client
            .get_account_with_commitment(address, self.commitment)
            .await
            .map_err(|e| LedgerError::request("getAccountInfo", e))?;
        Ok(response.value.map(|account| account.data))
    }

    async fn latest_blockhash(&self) -> Result<Hash, LedgerError> {
        self.client
            .get_latest_blockhash()
            .await
            .map_err(|e| LedgerError::request("getLatestBlockhash", e))
    }

    async fn submit(&self, tx: &Transaction) -> Result<Signature, LedgerError> {
        self.client.send_transaction(tx).await.map_err(|e| LedgerError::request("sendTransaction", e))
    }

    async fn status(&self, signature: &Signature) -> Result<TxStatus, LedgerError> {
        let response = self
            .client
            .get_signature_statuses(std::slice::from_ref(signature))
            .await
            .map_err(|e| LedgerError::request("getSignatureStatuses", e))?;
        Ok(match response.value.into_iter().next().flatten() {
            None => TxStatus::Unknown,
            Some(status) => classify_status(
                status.err.as_ref().map(|e| e.to_string()),
                status.satisfies_commitment(self.commitment),
            ),
        })
    }

    async fn version(&self) -> Result<String, LedgerError> {
        self.client
            .get_version()
            .await
            .map(|v| v.solana_core)
            .map_err(|e| LedgerError::request("getVersion", e))
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{LedgerAdapter, LedgerError, RawAccount, TxStatus};
    use async_trait::async_trait;
    use cm_core::{decode_job, encode_job, JobStatus, COMPLETE_JOB_DISCRIMINATOR};
    use parking_lot::Mutex;
    use solana_sdk::hash::Hash;
    use solana_sdk::pubkey::Pubkey;
    use solana_sdk::signature::Signature;
    use solana_sdk::transaction::Transaction;
    use std::sync::Arc;

    /// Recorded ledger call
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum LedgerCall {
        ProgramAccounts(Pubkey),
        AccountData(Pubkey),
        LatestBlockhash,
        Submit(Signature),
        Status(Signature),
        Version,
    }

    struct FakeLedgerState {
        accounts: Vec<RawAccount>,
        blockhash: Hash,
        tx_status: TxStatus,
        list_error: Option<String>,
        blockhash_error: Option<String>,
        submit_error: Option<String>,
        submitted: Vec<Transaction>,
        calls: Vec<LedgerCall>,
    }

    /// In-memory ledger for testing.
    ///
    /// Behaves like the marketplace program on submit: a `complete_job`
    /// instruction against a pending job marks it completed (when the
    /// configured status is `Confirmed`), and against any other job is
    /// rejected the way preflight would reject it.
    #[derive(Clone)]
    pub struct FakeLedgerAdapter {
        inner: Arc<Mutex<FakeLedgerState>>,
    }

    impl Default for FakeLedgerAdapter {
        fn default() -> Self {
            Self {
                inner: Arc::new(Mutex::new(FakeLedgerState {
                    accounts: Vec::new(),
                    blockhash: Hash::new_from_array([1; 32]),
                    tx_status: TxStatus::Confirmed,
                    list_error: None,
                    blockhash_error: None,
                    submit_error: None,
                    submitted: Vec::new(),
                    calls: Vec::new(),
                })),
            }
        }
    }

    impl FakeLedgerAdapter {
        pub fn new() -> Self {
            Self::default()
        }

        /// Add an account to the program listing (listing order is insertion order).
        pub fn add_account(&self, address: Pubkey, data: Vec<u8>) {
            self.inner.lock().accounts.push(RawAccount { address, data });
        }

        /// Current data of an account
        pub fn account(&self, address: &Pubkey) -> Option<Vec<u8>> {
            self.inner.lock().accounts.iter().find(|a| a.address == *address).map(|a| a.data.clone())
        }

        /// Status reported for every submitted transaction
        pub fn set_tx_status(&self, status: TxStatus) {
            self.inner.lock().tx_status = status;
        }

        pub fn fail_listing(&self, message: &str) {
            self.inner.lock().list_error = Some(message.to_string());
        }

        pub fn fail_blockhash(&self, message: &str) {
            self.inner.lock().blockhash_error = Some(message.to_string());
        }

        pub fn fail_submit(&self, message: &str) {
            self.inner.lock().submit_error = Some(message.to_string());
        }

        /// All transactions accepted by `submit`
        pub fn submitted(&self) -> Vec<Transaction> {
            self.inner.lock().submitted.clone()
        }

        /// Get all recorded calls
        pub fn calls(&self) -> Vec<LedgerCall> {
            self.inner.lock().calls.clone()
        }

        /// Number of status polls made
        pub fn status_polls(&self) -> usize {
            self.inner.lock().calls.iter().filter(|c| matches!(c, LedgerCall::Status(_))).count()
        }
    }

    /// Apply a `complete_job` instruction to the stored account it addresses.
    fn apply_completion(state: &mut FakeLedgerState, tx: &Transaction) -> Result<(), String> {
        for ix in &tx.message.instructions {
            if ix.data.len() < 12 || ix.data[..8] != COMPLETE_JOB_DISCRIMINATOR {
                continue;
            }
            let Some(job_key) =
                ix.accounts.first().and_then(|i| tx.message.account_keys.get(*i as usize))
            else {
                return Err("missing job account".to_string());
            };
            let Some(account) = state.accounts.iter_mut().find(|a| a.address == *job_key) else {
                return Err("AccountNotInitialized".to_string());
            };
            let mut job = decode_job(&account.data).map_err(|e| e.to_string())?;
            match job.status {
                JobStatus::Pending => {}
                JobStatus::Completed => return Err("JobAlreadyCompleted".to_string()),
                JobStatus::Cancelled => return Err("JobCancelled".to_string()),
            }
            let mut len = [0u8; 4];
            len.copy_from_slice(&ix.data[8..12]);
            let end = 12 + u32::from_le_bytes(len) as usize;
            let (Some(cid), Some(cost)) = (ix.data.get(12..end), ix.data.get(end..end + 8)) else {
                return Err("InstructionDidNotDeserialize".to_string());
            };
            let mut cost_bytes = [0u8; 8];
            cost_bytes.copy_from_slice(cost);
            job.result_cid = String::from_utf8_lossy(cid).into_owned();
            job.cost = u64::from_le_bytes(cost_bytes);
            job.status = JobStatus::Completed;
            account.data = encode_job(&job);
        }
        Ok(())
    }

    #[async_trait]
    impl LedgerAdapter for FakeLedgerAdapter {
        async fn program_accounts(
            &self,
            program_id: &Pubkey,
        ) -> Result<Vec<RawAccount>, LedgerError> {
            let mut inner = self.inner.lock();
            inner.calls.push(LedgerCall::ProgramAccounts(*program_id));
            if let Some(message) = &inner.list_error {
                return Err(LedgerError::Request { op: "getProgramAccounts", message: message.clone() });
            }
            Ok(inner.accounts.clone())
        }

        async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError> {
            let mut inner = self.inner.lock();
            inner.calls.push(LedgerCall::AccountData(*address));
            Ok(inner.accounts.iter().find(|a| a.address == *address).map(|a| a.data.clone()))
        }

        async fn latest_blockhash(&self) -> Result<Hash, LedgerError> {
            let mut inner = self.inner.lock();
            inner.calls.push(LedgerCall::LatestBlockhash);
            if let Some(message) = &inner.blockhash_error {
                return Err(LedgerError::Request { op: "getLatestBlockhash", message: message.clone() });
            }
            Ok(inner.blockhash)
        }

        async fn submit(&self, tx: &Transaction) -> Result<Signature, LedgerError> {
            let mut inner = self.inner.lock();
            let signature = tx.signatures.first().copied().unwrap_or_default();
            inner.calls.push(LedgerCall::Submit(signature));
            if let Some(message) = &inner.submit_error {
                return Err(LedgerError::Request { op: "sendTransaction", message: message.clone() });
            }
            if tx.verify().is_err() {
                return Err(LedgerError::Request {
                    op: "sendTransaction",
                    message: "signature verification failed".to_string(),
                });
            }
            if inner.tx_status == TxStatus::Confirmed {
                apply_completion(&mut inner, tx)
                    .map_err(|message| LedgerError::Request { op: "sendTransaction", message })?;
            }
            inner.submitted.push(tx.clone());
            Ok(signature)
        }

        async fn status(&self, signature: &Signature) -> Result<TxStatus, LedgerError> {
            let mut inner = self.inner.lock();
            inner.calls.push(LedgerCall::Status(*signature));
            Ok(inner.tx_status.clone())
        }

        async fn version(&self) -> Result<String, LedgerError> {
            self.inner.lock().calls.push(LedgerCall::Version);
            Ok("fake-2.2.0".to_string())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeLedgerAdapter, LedgerCall};

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
