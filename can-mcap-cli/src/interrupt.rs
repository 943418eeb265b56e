//! Ctrl-C handling for long conversions.
//!
//! The conversion loop is synchronous; a watcher thread runs a small tokio
//! runtime that waits for the interrupt and raises the shared cancel flag. The
//! loop then stops before the next frame and the output is still finalized.

use anyhow::{Context, Result};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Raise `cancel` on the first Ctrl-C
pub fn cancel_on_ctrl_c(cancel: Arc<AtomicBool>) -> Result<JoinHandle<()>> {
    cancel_when(cancel, tokio::signal::ctrl_c())
}

/// Raise `cancel` once `shutdown` resolves successfully
pub fn cancel_when<F>(cancel: Arc<AtomicBool>, shutdown: F) -> Result<JoinHandle<()>>
where
    F: Future<Output = std::io::Result<()>> + Send + 'static,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start the interrupt watcher")?;

    thread::Builder::new()
        .name("interrupt".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                match shutdown.await {
                    Ok(()) => {
                        log::warn!("Interrupted, finishing the output file");
                        cancel.store(true, Ordering::SeqCst);
                    }
                    Err(err) => log::warn!("Interrupt handler unavailable: {}", err),
                }
            })
        })
        .context("Failed to spawn the interrupt watcher")
}
