// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job account model.
//!
//! A [`Job`] is the worker's read-only view of a job account owned by the
//! marketplace program. The ledger copy is authoritative: the worker only
//! decodes it and later asks the program to transition it.

use solana_sdk::pubkey::Pubkey;

/// Lifecycle state of a job, as stored in the account's status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Pending,
    Completed,
    Cancelled,
}

impl JobStatus {
    /// Decode the on-ledger enum tag.
    pub fn from_byte(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(JobStatus::Pending),
            1 => Some(JobStatus::Completed),
            2 => Some(JobStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Completed => 1,
            JobStatus::Cancelled => 2,
        }
    }

    /// Only pending jobs are eligible for processing.
    pub fn is_pending(self) -> bool {
        matches!(self, JobStatus::Pending)
    }
}

crate::simple_display! {
    JobStatus {
        Pending => "pending",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

/// How the job was submitted. Informational; forwarded to the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobType {
    Cron,
    Api,
    Manual,
}

impl JobType {
    pub fn from_byte(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(JobType::Cron),
            1 => Some(JobType::Api),
            2 => Some(JobType::Manual),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            JobType::Cron => 0,
            JobType::Api => 1,
            JobType::Manual => 2,
        }
    }

    /// Name sent to the execution backend.
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::Cron => "CRON",
            JobType::Api => "API",
            JobType::Manual => "MANUAL",
        }
    }
}

crate::simple_display! {
    JobType {
        Cron => "CRON",
        Api => "API",
        Manual => "MANUAL",
    }
}

/// Decoded contents of a job account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub owner: Pubkey,
    pub title: String,
    pub code_cid: String,
    /// Empty until the job is settled.
    pub result_cid: String,
    pub start_time: i64,
    /// Meaningful only after settlement.
    pub end_time: i64,
    pub status: JobStatus,
    pub job_type: JobType,
    /// Smallest settlement unit; zero until settled.
    pub cost: u64,
    pub cost_paid: bool,
    /// Address-derivation salt. Part of the layout, never used by the worker.
    pub bump: u8,
}

impl Job {
    pub fn is_pending(&self) -> bool {
        self.status.is_pending()
    }
}

/// A job paired with the ledger address that holds it.
///
/// The address comes from the account listing, not from the account bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub address: Pubkey,
    pub job: Job,
}

crate::builder! {
    pub struct JobBuilder => Job {
        into {
            title: String = "nightly report",
            code_cid: String = "QmTestCode",
            result_cid: String = "",
        }
        set {
            owner: Pubkey = Pubkey::new_from_array([7; 32]),
            start_time: i64 = 1_700_000_000,
            end_time: i64 = 0,
            status: JobStatus = JobStatus::Pending,
            job_type: JobType = JobType::Manual,
            cost: u64 = 0,
            cost_paid: bool = false,
            bump: u8 = 254,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
