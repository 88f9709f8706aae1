// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::codec::encode_job;
use crate::job::{Candidate, Job, JobStatus};
use solana_sdk::pubkey::Pubkey;

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for account-level types.
pub mod strategies {
    use crate::job::{Job, JobStatus, JobType};
    use proptest::prelude::*;
    use solana_sdk::pubkey::Pubkey;

    pub fn arb_job_status() -> impl Strategy<Value = JobStatus> {
        prop_oneof![Just(JobStatus::Pending), Just(JobStatus::Completed), Just(JobStatus::Cancelled)]
    }

    pub fn arb_job_type() -> impl Strategy<Value = JobType> {
        prop_oneof![Just(JobType::Cron), Just(JobType::Api), Just(JobType::Manual)]
    }

    pub fn arb_pubkey() -> impl Strategy<Value = Pubkey> {
        any::<[u8; 32]>().prop_map(Pubkey::new_from_array)
    }

    pub fn arb_job() -> impl Strategy<Value = Job> {
        (
            (arb_pubkey(), ".{0,100}", "[A-Za-z0-9]{0,100}", "[A-Za-z0-9]{0,100}"),
            (any::<i64>(), any::<i64>(), arb_job_status(), arb_job_type()),
            (any::<u64>(), any::<bool>(), any::<u8>()),
        )
            .prop_map(
                |(
                    (owner, title, code_cid, result_cid),
                    (start_time, end_time, status, job_type),
                    (cost, cost_paid, bump),
                )| Job {
                    owner,
                    title,
                    code_cid,
                    result_cid,
                    start_time,
                    end_time,
                    status,
                    job_type,
                    cost,
                    cost_paid,
                    bump,
                },
            )
    }
}

// ── Account fixtures ────────────────────────────────────────────────────

/// Deterministic address for fixture number `n`.
pub fn address(n: u8) -> Pubkey {
    Pubkey::new_from_array([n; 32])
}

/// Encoded pending job account with the given code id.
pub fn pending_account(code_cid: &str) -> Vec<u8> {
    encode_job(&Job::builder().code_cid(code_cid).build())
}

/// Encoded job account in the given status.
pub fn account_with_status(code_cid: &str, status: JobStatus) -> Vec<u8> {
    encode_job(&Job::builder().code_cid(code_cid).status(status).build())
}

/// Candidate for a pending job at fixture address `n`.
pub fn pending_candidate(n: u8, code_cid: &str) -> Candidate {
    Candidate { address: address(n), job: Job::builder().code_cid(code_cid).build() }
}
