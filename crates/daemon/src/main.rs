// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `cmw`: polls a marketplace program for pending jobs, runs them and
//! settles the results on the ledger.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use cm_daemon::lifecycle::shutdown;
use cm_daemon::{env, logging, startup, Config, LifecycleError};
use cm_engine::OrchestratorStats;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "cmw", version, about = "Runs and settles pending marketplace jobs")]
struct Args {
    /// Marketplace program id (base58)
    #[arg(value_name = "PROGRAM_ID")]
    program_id: String,

    /// Signing keypair file [default: ~/.config/solana/id.json]
    #[arg(value_name = "KEYPAIR_PATH")]
    keypair: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let log_dir = env::log_dir();
    let _guard = match logging::init(&env::log_filter(), log_dir.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("cmw: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(args).await {
        Ok(stats) => {
            info!(processed = stats.processed, failed = stats.failed, "worker stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "startup failed");
            eprintln!("cmw: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<OrchestratorStats, LifecycleError> {
    let config = Config::load(&args.program_id, args.keypair)?;
    let mut worker = startup(&config).await?;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        shutdown::watch(trigger, shutdown::signal).await;
        std::process::exit(shutdown::FORCED_EXIT_CODE);
    });

    Ok(worker.run(cancel).await)
}
