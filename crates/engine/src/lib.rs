// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cm-engine: job orchestration and settlement

pub mod orchestrator;
pub mod settlement;

pub use orchestrator::{
    CycleReport, JobError, JobOrchestrator, JobReceipt, Listing, OrchestratorConfig,
    OrchestratorStats, PublishFallback, WorkerDeps,
};
pub use settlement::{SettlementClient, SettlementConfig, SettlementError};
