//! Process lifecycle and graceful shutdown.
//!
//! When a shutdown signal is received (Ctrl+C or SIGTERM):
//! 1. Shutdown is broadcast to every background task
//! 2. Each task gets the configured timeout to finish its current work
//! 3. Clean exit

use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// A signal handler that cannot be installed is logged and never fires, so
/// the other source still works.
pub async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        () = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}

/// Wait for named background tasks to finish, giving each `timeout`.
///
/// Returns how many tasks stopped cleanly.
pub async fn await_shutdown(tasks: Vec<(&'static str, JoinHandle<()>)>, timeout: Duration) -> usize {
    let mut stopped = 0;

    for (task, handle) in tasks {
        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(())) => {
                stopped += 1;
                info!(task, "Task stopped gracefully");
            }
            Ok(Err(e)) => warn!(task, error = %e, "Task failed"),
            Err(_) => warn!(task, "Task shutdown timed out"),
        }
    }

    stopped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn slow_tasks_time_out() {
        let quick = tokio::spawn(async {});
        let stuck = tokio::spawn(std::future::pending::<()>());

        let stopped = await_shutdown(
            vec![("quick", quick), ("stuck", stuck)],
            Duration::from_secs(1),
        )
        .await;

        assert_eq!(stopped, 1);
    }

    #[tokio::test]
    #[allow(clippy::panic)]
    async fn panicked_tasks_are_reported_not_propagated() {
        let failing = tokio::spawn(async { panic!("boom") });

        let stopped = await_shutdown(vec![("failing", failing)], Duration::from_secs(1)).await;

        assert_eq!(stopped, 0);
    }
}
