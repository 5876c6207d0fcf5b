//! Timer trigger: reload on a fixed interval from a background thread.

use std::sync::Weak;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError};

use super::{RELOAD_STACK_SIZE, Reloadable, TriggerHandle, label};
use crate::reload::error::ReloadError;

/// Spawn a thread that calls `reload()` every `interval`.
///
/// Starting twice for the same proxy gives two independent loops; their
/// reloads are serialized by the proxy, not coordinated.
pub fn start(target: Weak<dyn Reloadable>, interval: Duration) -> Result<TriggerHandle, ReloadError> {
    if interval.is_zero() {
        return Err(ReloadError::InvalidInterval);
    }
    let label = match target.upgrade() {
        Some(target) => label(target.as_ref()),
        None => return Err(ReloadError::Detached("timer target".to_string())),
    };

    let (stop, stopped) = channel::bounded::<()>(0);
    let thread = thread::Builder::new()
        .name(format!("reloadr-timer {label}"))
        .stack_size(RELOAD_STACK_SIZE)
        .spawn(move || run(target, interval, stopped))
        .map_err(ReloadError::Spawn)?;

    crate::debug!("timer"; "reloading {} every {:?}", label, interval);
    Ok(TriggerHandle::timer(label, interval, stop, thread))
}

fn run(target: Weak<dyn Reloadable>, interval: Duration, stopped: Receiver<()>) {
    loop {
        match stopped.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            // Handle stopped or dropped
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }

        let Some(target) = target.upgrade() else {
            break;
        };
        if let Err(err) = target.reload() {
            crate::log!("timer"; "stopping {}: {:#}", label(target.as_ref()), anyhow::Error::new(err));
            break;
        }
    }
}
