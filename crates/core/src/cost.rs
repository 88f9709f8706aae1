// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Settlement cost model.
//!
//! `cost = BASE_COST + (code_size + result_size) * SIZE_RATE + floor(seconds * TIME_RATE)`

use std::time::Duration;
use thiserror::Error;

/// Flat fee charged for every job, in base units.
pub const BASE_COST: u64 = 1_000_000;
/// Charge per byte of code plus serialized result.
pub const SIZE_RATE: u64 = 10;
/// Charge per second of reported execution time.
pub const TIME_RATE: u64 = 100;

/// Base units per whole settlement token (for display only).
pub const UNITS_PER_TOKEN: u64 = 1_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CostError {
    #[error("cost overflows u64 (code {code_size} B, result {result_size} B, {execution_ms} ms)")]
    Overflow { code_size: u64, result_size: u64, execution_ms: u128 },
}

/// Compute the settlement cost of a job.
///
/// The time component is computed from whole milliseconds so it never depends
/// on float rounding.
pub fn compute(code_size: u64, result_size: u64, execution_time: Duration) -> Result<u64, CostError> {
    let execution_ms = execution_time.as_millis();
    let overflow = || CostError::Overflow { code_size, result_size, execution_ms };

    let size = code_size
        .checked_add(result_size)
        .and_then(|bytes| bytes.checked_mul(SIZE_RATE))
        .ok_or_else(overflow)?;
    let time = execution_ms
        .checked_mul(u128::from(TIME_RATE))
        .map(|scaled| scaled / 1000)
        .and_then(|units| u64::try_from(units).ok())
        .ok_or_else(overflow)?;

    BASE_COST.checked_add(size).and_then(|c| c.checked_add(time)).ok_or_else(overflow)
}

/// Render a base-unit amount as a 9-decimal token amount.
pub fn format_tokens(units: u64) -> String {
    format!("{}.{:09}", units / UNITS_PER_TOKEN, units % UNITS_PER_TOKEN)
}

#[cfg(test)]
#[path = "cost_tests.rs"]
mod tests;
