//! Termination signal handling for SIGTERM and SIGINT.
//!
//! On Unix both listeners are registered by [`ShutdownSignal::install`], so a
//! signal arriving during startup (bucket probes, task registration) is held
//! until [`ShutdownSignal::wait`] runs instead of killing the process.

use tokio::signal;
use tracing::info;

pub struct ShutdownSignal {
    #[cfg(unix)]
    interrupt: signal::unix::Signal,
    #[cfg(unix)]
    terminate: signal::unix::Signal,
}

impl ShutdownSignal {
    /// Install the signal handlers. Must be called inside a Tokio runtime.
    #[cfg(unix)]
    pub fn install() -> std::io::Result<Self> {
        use signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {})
    }

    /// Wait for SIGINT (Ctrl+C) or SIGTERM
    #[cfg(unix)]
    pub async fn wait(self) {
        let Self {
            mut interrupt,
            mut terminate,
        } = self;

        tokio::select! {
            _ = interrupt.recv() => {
                info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
            }
            _ = terminate.recv() => {
                info!("Received SIGTERM, initiating graceful shutdown...");
            }
        }
    }

    /// Wait for Ctrl+C
    #[cfg(not(unix))]
    pub async fn wait(self) {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown..."),
            Err(e) => {
                tracing::warn!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }
}
