// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Adapters for the worker's external capabilities: ledger, content storage
//! and the execution backend.

pub mod executor;
pub mod ledger;
pub mod storage;

pub use executor::{ExecutorAdapter, ExecutorError, HttpExecutorAdapter, JobMetadata};
pub use ledger::{LedgerAdapter, LedgerError, RawAccount, RpcLedgerAdapter, TxStatus};
pub use storage::{IpfsStorageAdapter, StorageAdapter, StorageError, DEFAULT_GATEWAY};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use executor::{ExecutorCall, FakeExecutorAdapter};
#[cfg(any(test, feature = "test-support"))]
pub use ledger::{FakeLedgerAdapter, LedgerCall};
#[cfg(any(test, feature = "test-support"))]
pub use storage::{FakeStorageAdapter, StorageCall};
