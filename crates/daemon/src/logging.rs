// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing subscriber setup.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::lifecycle::LifecycleError;

/// Daily-rotated log file name inside the log directory
pub const LOG_FILE: &str = "cmw.log";

/// Parse a filter directive, falling back to `info` when it does not parse.
pub fn filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber: stderr always, plus a rotating file under
/// `log_dir` when given. Keep the returned guard alive for the process
/// lifetime or buffered file output is lost.
pub fn init(directive: &str, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>, LifecycleError> {
    let stderr = fmt::layer().with_writer(std::io::stderr).with_target(false);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, LOG_FILE));
            tracing_subscriber::registry()
                .with(filter(directive))
                .with(stderr)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .try_init()
                .map_err(|e| LifecycleError::Logging(e.to_string()))?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter(directive))
                .with(stderr)
                .try_init()
                .map_err(|e| LifecycleError::Logging(e.to_string()))?;
            Ok(None)
        }
    }
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
