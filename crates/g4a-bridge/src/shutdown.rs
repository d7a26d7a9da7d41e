//! Signal-driven shutdown
//!
//! The worker must not outlive the host. These helpers wait for Ctrl-C (and
//! SIGTERM on Unix) and stop the worker before the host exits.

use crate::bridge::WorkerBridge;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Resolve when the host is asked to terminate
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C"),
        () = terminate => info!("Received SIGTERM"),
    }
}

/// Stop `bridge`'s worker once a shutdown signal arrives
///
/// The returned task resolves after the worker has exited.
pub fn stop_on_signal(bridge: WorkerBridge) -> JoinHandle<()> {
    stop_when(bridge, shutdown_signal())
}

/// Stop `bridge`'s worker once `trigger` resolves
pub fn stop_when<F>(bridge: WorkerBridge, trigger: F) -> JoinHandle<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        trigger.await;
        info!("Shutting down worker");
        if let Err(err) = bridge.stop().await {
            warn!("Stopping worker failed: {}", err);
        }
    })
}
