// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cm-core: account codec, cost model and result types for the cloudmesh worker

pub mod macros;

pub mod codec;
pub mod cost;
pub mod job;
pub mod result;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

#[cfg(any(test, feature = "test-support"))]
pub use codec::encode_job;
pub use codec::{
    decode_job, encode_completion, CompleteJob, DecodeError, COMPLETE_JOB_DISCRIMINATOR,
    MIN_JOB_ACCOUNT_LEN,
};
pub use cost::{format_tokens, CostError};
#[cfg(any(test, feature = "test-support"))]
pub use job::JobBuilder;
pub use job::{Candidate, Job, JobStatus, JobType};
pub use result::{fallback_cid, ExecutionResult, ExecutionStatus};

/// Re-exported so dependents name ledger types through one crate.
pub use solana_sdk::pubkey::Pubkey;
