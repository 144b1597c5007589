//! Interrupt handling for the noderig CLI

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Signals that the user asked the CLI to stop.
#[derive(Debug, Clone, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger a shutdown
    pub fn shutdown(&self) {
        info!("Shutdown triggered");
        self.token.cancel();
    }

    /// Whether a shutdown was triggered
    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait for shutdown; returns immediately once triggered
    pub async fn wait_for_shutdown(&self) {
        self.token.cancelled().await;
    }
}

/// Install signal handlers for graceful shutdown
///
/// Returns a `ShutdownCoordinator` that fires on SIGINT or SIGTERM (Ctrl+C or
/// Ctrl+Break on Windows). If the handlers cannot be installed the
/// coordinator simply never fires.
pub fn install_signal_handlers() -> ShutdownCoordinator {
    let coordinator = ShutdownCoordinator::new();
    let coordinator_clone = coordinator.clone();

    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            let (mut sigterm, mut sigint) =
                match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                    (Ok(term), Ok(int)) => (term, int),
                    (Err(e), _) | (_, Err(e)) => {
                        warn!(error = %e, "Failed to install signal handlers");
                        return;
                    }
                };

            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, initiating graceful shutdown");
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, initiating graceful shutdown");
                }
            }
        }

        #[cfg(windows)]
        {
            use tokio::signal::windows;

            let (mut ctrl_c, mut ctrl_break) = match (windows::ctrl_c(), windows::ctrl_break()) {
                (Ok(c), Ok(b)) => (c, b),
                (Err(e), _) | (_, Err(e)) => {
                    warn!(error = %e, "Failed to install console handlers");
                    return;
                }
            };

            tokio::select! {
                _ = ctrl_c.recv() => {
                    info!("Received Ctrl+C, initiating graceful shutdown");
                }
                _ = ctrl_break.recv() => {
                    info!("Received Ctrl+Break, initiating graceful shutdown");
                }
            }
        }

        coordinator_clone.shutdown();
    });

    coordinator
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_returns_after_shutdown() {
        let coordinator = ShutdownCoordinator::new();
        assert!(!coordinator.is_shutdown());

        let waiter = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.wait_for_shutdown().await })
        };
        coordinator.shutdown();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(coordinator.is_shutdown());
    }

    #[tokio::test]
    async fn test_shutdown_before_wait_is_not_lost() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.shutdown();
        tokio::time::timeout(Duration::from_secs(1), coordinator.wait_for_shutdown())
            .await
            .unwrap();
    }
}
