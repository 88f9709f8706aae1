// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shutdown signals. The first stops the job loop once the current job is
//! done; a second one forces the process out.

use std::future::Future;

use tokio_util::sync::CancellationToken;

/// Exit status after a forced shutdown (128 + SIGINT).
pub const FORCED_EXIT_CODE: i32 = 130;

/// Cancel `cancel` on the first signal and return on the second.
pub async fn watch<F, Fut>(cancel: CancellationToken, mut next_signal: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    next_signal().await;
    tracing::info!("shutdown requested, finishing current job (signal again to force exit)");
    cancel.cancel();

    next_signal().await;
    tracing::warn!("second shutdown signal, exiting without waiting for the current job");
}

/// Resolves on ctrl-c, or SIGTERM on unix.
pub async fn signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(test)]
#[path = "shutdown_tests.rs"]
mod tests;
