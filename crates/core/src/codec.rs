// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Binary codec for the marketplace program's account and instruction layouts.
//!
//! Job account layout (little-endian, fixed field order):
//!
//! ```text
//! [0..8)    discriminator (skipped)
//! [8..40)   owner pubkey
//!           title       u32 length + UTF-8
//!           code_cid    u32 length + UTF-8
//!           result_cid  u32 length + UTF-8
//!           start_time  i64
//!           end_time    i64
//!           status      u8 enum tag
//!           job_type    u8 enum tag
//!           cost        u64
//!           cost_paid   u8 bool
//!           bump        u8
//! ```
//!
//! Accounts are allocated at a fixed size, so bytes after `bump` are padding
//! and ignored.
//!
//! Completion instruction payload:
//!
//! ```text
//! discriminator [u8; 8] | result_cid (u32 length + UTF-8) | cost u64
//! ```

use crate::job::{Job, JobStatus, JobType};
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

/// Length of every account and instruction discriminator.
pub const DISCRIMINATOR_LEN: usize = 8;

/// Tag hashed to produce [`COMPLETE_JOB_DISCRIMINATOR`].
pub const COMPLETE_JOB_TAG: &str = "global:complete_job";

/// `SHA-256("global:complete_job")[..8]`.
///
/// The program computes the same bytes independently; this must never change.
pub const COMPLETE_JOB_DISCRIMINATOR: [u8; DISCRIMINATOR_LEN] =
    [0xdd, 0xd8, 0xe1, 0x48, 0x65, 0xfa, 0x03, 0x0b];

/// Tag hashed to produce [`JOB_ACCOUNT_DISCRIMINATOR`].
pub const JOB_ACCOUNT_TAG: &str = "account:Job";

/// `SHA-256("account:Job")[..8]`. Written by the test encoder; decoding skips it.
pub const JOB_ACCOUNT_DISCRIMINATOR: [u8; DISCRIMINATOR_LEN] =
    [0x4b, 0x7c, 0x50, 0xcb, 0xa1, 0xb4, 0xca, 0x50];

/// Smallest buffer that can hold a job account (all strings empty).
pub const MIN_JOB_ACCOUNT_LEN: usize = DISCRIMINATOR_LEN + 32 + 3 * 4 + 2 * 8 + 1 + 1 + 8 + 1 + 1;

/// Errors from decoding account bytes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("truncated {field} at offset {offset}: need {needed} bytes, {remaining} remaining")]
    Truncated { field: &'static str, offset: usize, needed: usize, remaining: usize },
    #[error("{field} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },
    #[error("unknown {field} tag {value}")]
    InvalidEnum { field: &'static str, value: u8 },
    #[error("invalid bool byte {value}")]
    InvalidBool { value: u8 },
}

/// Bounds-checked little-endian cursor over account bytes.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, field: &'static str, n: usize) -> Result<&'a [u8], DecodeError> {
        let remaining = self.buf.len().saturating_sub(self.pos);
        if n > remaining {
            return Err(DecodeError::Truncated { field, offset: self.pos, needed: n, remaining });
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(field, N)?);
        Ok(out)
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, DecodeError> {
        Ok(self.array::<1>(field)?[0])
    }

    fn u32(&mut self, field: &'static str) -> Result<u32, DecodeError> {
        self.array(field).map(u32::from_le_bytes)
    }

    fn u64(&mut self, field: &'static str) -> Result<u64, DecodeError> {
        self.array(field).map(u64::from_le_bytes)
    }

    fn i64(&mut self, field: &'static str) -> Result<i64, DecodeError> {
        self.array(field).map(i64::from_le_bytes)
    }

    fn bool(&mut self, field: &'static str) -> Result<bool, DecodeError> {
        match self.u8(field)? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(DecodeError::InvalidBool { value }),
        }
    }

    fn string(&mut self, field: &'static str) -> Result<String, DecodeError> {
        let len = self.u32(field)? as usize;
        let bytes = self.take(field, len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidUtf8 { field })
    }
}

/// Decode a job account. The leading discriminator is skipped, not validated.
pub fn decode_job(data: &[u8]) -> Result<Job, DecodeError> {
    let mut r = Reader::new(data);
    r.take("discriminator", DISCRIMINATOR_LEN)?;

    let owner = Pubkey::new_from_array(r.array("owner")?);
    let title = r.string("title")?;
    let code_cid = r.string("code_cid")?;
    let result_cid = r.string("result_cid")?;
    let start_time = r.i64("start_time")?;
    let end_time = r.i64("end_time")?;

    let tag = r.u8("status")?;
    let status =
        JobStatus::from_byte(tag).ok_or(DecodeError::InvalidEnum { field: "status", value: tag })?;
    let tag = r.u8("job_type")?;
    let job_type =
        JobType::from_byte(tag).ok_or(DecodeError::InvalidEnum { field: "job_type", value: tag })?;

    let cost = r.u64("cost")?;
    let cost_paid = r.bool("cost_paid")?;
    let bump = r.u8("bump")?;

    Ok(Job {
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
    })
}

fn put_string(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u32).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

/// Arguments of the program's `complete_job` instruction.
///
/// Built fresh for each settlement and dropped once the transaction is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteJob {
    pub result_cid: String,
    pub cost: u64,
}

impl CompleteJob {
    pub fn new(result_cid: impl Into<String>, cost: u64) -> Self {
        Self { result_cid: result_cid.into(), cost }
    }

    /// Encode the instruction data.
    pub fn encode(&self) -> Vec<u8> {
        encode_completion(&self.result_cid, self.cost)
    }
}

/// Encode `complete_job` instruction data for the given result and cost.
pub fn encode_completion(result_cid: &str, cost: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(DISCRIMINATOR_LEN + 4 + result_cid.len() + 8);
    out.extend_from_slice(&COMPLETE_JOB_DISCRIMINATOR);
    put_string(&mut out, result_cid);
    out.extend_from_slice(&cost.to_le_bytes());
    out
}

/// Encode a job account the way the program lays it out.
///
/// The worker never writes accounts; this exists for fixtures and fakes.
#[cfg(any(test, feature = "test-support"))]
pub fn encode_job(job: &Job) -> Vec<u8> {
    let mut out = Vec::with_capacity(MIN_JOB_ACCOUNT_LEN + job.title.len() + job.code_cid.len());
    out.extend_from_slice(&JOB_ACCOUNT_DISCRIMINATOR);
    out.extend_from_slice(job.owner.as_ref());
    put_string(&mut out, &job.title);
    put_string(&mut out, &job.code_cid);
    put_string(&mut out, &job.result_cid);
    out.extend_from_slice(&job.start_time.to_le_bytes());
    out.extend_from_slice(&job.end_time.to_le_bytes());
    out.push(job.status.as_byte());
    out.push(job.job_type.as_byte());
    out.extend_from_slice(&job.cost.to_le_bytes());
    out.push(u8::from(job.cost_paid));
    out.push(job.bump);
    out
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
