//! CLI module for `reloadr` commands.

mod args;
pub mod check;
pub mod run;

pub use args::{Cli, Commands, RunArgs};

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use crossbeam::channel::{Receiver, bounded};
use reloadr::script::interp;

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Install the Ctrl+C handler. Call once at program start.
///
/// The first Ctrl+C asks running scripts to unwind and wakes the returned
/// receiver. A second one exits immediately.
pub fn setup_shutdown_handler() -> Result<Receiver<()>> {
    let (tx, rx) = bounded(1);
    ctrlc::set_handler(move || {
        if SHUTDOWN.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        interp::interrupt();
        let _ = tx.try_send(());
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))?;
    Ok(rx)
}
