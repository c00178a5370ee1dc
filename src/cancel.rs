//! Cooperative cancellation shared between the signal listener and workers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use colored::Colorize;
use log::{debug, warn};
use tokio::task::JoinHandle;

/// Token for cooperative cancellation of a sweep.
///
/// Uses an `AtomicBool` internally: written once by whoever requests the
/// stop, read by every worker before each probe. Clone is cheap and shares
/// state; the token's lifetime is scoped to one run, there is no
/// process-global flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new token (not cancelled).
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Request cancellation. Returns `true` the first time, `false` on
    /// every repeat; later calls are no-ops.
    pub fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::SeqCst)
    }
}

/// Listens for SIGINT/SIGTERM and flips the token instead of letting the
/// default handler kill the process mid-batch.
///
/// The first signal prints the stop notice; any further signals are
/// swallowed so the drain stays in control until in-flight batches finish
/// or abort. The task never resolves on its own and is dropped with the
/// runtime.
pub fn spawn_signal_listener(cancel: CancellationToken, accessible: bool) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            wait_for_signal().await;
            if cancel.cancel() {
                let notice = "Stopping; waiting for in-flight batches to complete";
                if accessible {
                    eprintln!("{notice}");
                } else {
                    eprintln!("{}", notice.yellow());
                }
            } else {
                debug!("repeated interrupt ignored; drain already in progress");
            }
        }
    })
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(err) => {
            warn!("could not install SIGTERM handler: {err}");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
