//! Cooperative shutdown.
//!
//! SIGINT and SIGTERM only set a flag. The outbound loop checks it after
//! every `receive`, so shutdown latency is bounded by the layer's receive
//! timeout.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::JoinHandle;

/// Shared "stop requested" flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Idempotent.
    pub fn trigger(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Install SIGINT/SIGTERM handlers that trigger `flag`.
///
/// Must be called from inside a tokio runtime. Fails if the SIGTERM
/// handler cannot be registered.
pub fn spawn_signal_listener(flag: ShutdownFlag) -> std::io::Result<JoinHandle<()>> {
    let terminate = terminate_signal()?;

    Ok(tokio::spawn(async move {
        let name = tokio::select! {
            () = interrupt() => "SIGINT",
            () = terminate => "SIGTERM",
        };
        tracing::info!(signal = name, "shutdown signal received");
        flag.trigger();
    }))
}

async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for SIGINT");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
fn terminate_signal() -> std::io::Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    Ok(async move {
        sigterm.recv().await;
    })
}

#[cfg(not(unix))]
fn terminate_signal() -> std::io::Result<impl Future<Output = ()>> {
    Ok(std::future::pending::<()>())
}
