// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment fixtures for lifecycle tests. Callers must be `#[serial]`.

use std::path::Path;

use solana_sdk::signature::{write_keypair_file, Keypair};

pub const PROGRAM_ID: &str = "Fg6PaFpoGXkYsidMpWTK6W2BeZ7FEfcYkg476zPFsLnS";

const WORKER_VARS: &[&str] = &[
    "SOLANA_RPC_URL",
    "CM_EXECUTOR_URL",
    "CM_EXECUTOR_TOKEN",
    "IPFS_GATEWAY",
    "PINATA_JWT",
    "CM_POLL_INTERVAL_SECS",
    "CM_JOB_PACING_MS",
    "CM_HTTP_TIMEOUT_MS",
    "CM_CONFIRM_ATTEMPTS",
    "CM_CONFIRM_DELAY_MS",
    "CM_FETCH_ATTEMPTS",
    "CM_REQUIRE_PUBLISH",
];

pub fn clear_env() {
    for var in WORKER_VARS {
        std::env::remove_var(var);
    }
}

/// Required variables set, everything else at defaults. The RPC url points
/// at a closed loopback port.
pub fn required_env() {
    clear_env();
    std::env::set_var("SOLANA_RPC_URL", "http://127.0.0.1:9");
    std::env::set_var("CM_EXECUTOR_URL", "http://127.0.0.1:9/run");
    std::env::set_var("CM_EXECUTOR_TOKEN", "secret");
    std::env::set_var("CM_HTTP_TIMEOUT_MS", "2000");
}

/// Write a fresh keypair file and return its keypair.
pub fn write_keypair(path: &Path) -> Keypair {
    let keypair = Keypair::new();
    write_keypair_file(&keypair, path).unwrap();
    keypair
}
