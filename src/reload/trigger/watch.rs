//! Watch trigger: reload whenever the target's source file is written.
//!
//! Watching happens at directory granularity, so events for sibling files
//! arrive too and are filtered by exact path on notify's callback thread.
//! Matching events are forwarded to a named reload thread, one reload per
//! event.

use std::path::{Path, PathBuf};
use std::sync::Weak;
use std::thread;

use crossbeam::channel::{self, Receiver};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};

use super::{RELOAD_STACK_SIZE, Reloadable, TriggerHandle, label};
use crate::reload::error::ReloadError;
use crate::utils::path::normalize_path;

/// Watch the directory containing `target`'s source file.
pub fn start(target: Weak<dyn Reloadable>) -> Result<TriggerHandle, ReloadError> {
    let (label, source) = match target.upgrade() {
        Some(target) => (label(target.as_ref()), normalize_path(target.source_path())),
        None => return Err(ReloadError::Detached("watch target".to_string())),
    };
    let dir = source
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let (changed_tx, changed) = channel::unbounded::<()>();
    let watched = source.clone();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) if is_source_change(&event, &watched) => {
            changed_tx.send(()).ok();
        }
        Ok(_) => {}
        Err(err) => crate::log!("watch"; "error: {err}"),
    })?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;

    let (stop, stopped) = channel::bounded::<()>(0);
    let thread = thread::Builder::new()
        .name(format!("reloadr-watch {label}"))
        .stack_size(RELOAD_STACK_SIZE)
        .spawn(move || run(target, changed, stopped))
        .map_err(ReloadError::Spawn)?;

    crate::debug!("watch"; "watching {} for {}", source.display(), label);
    Ok(TriggerHandle::watch(label, watcher, stop, thread))
}

fn run(target: Weak<dyn Reloadable>, changed: Receiver<()>, stopped: Receiver<()>) {
    loop {
        // Stop signal, dropped handle or dropped watcher
        let fired = channel::select! {
            recv(stopped) -> _ => false,
            recv(changed) -> msg => msg.is_ok(),
        };
        if !fired {
            break;
        }

        let Some(target) = target.upgrade() else {
            break;
        };
        if let Err(err) = target.reload() {
            crate::log!("watch"; "reload of {} failed: {:#}", label(target.as_ref()), anyhow::Error::new(err));
        }
    }
}

/// Whether `event` means new content was written to `source`.
///
/// Data writes and creations count, as does a rename onto the file (the
/// atomic-save pattern of most editors). Metadata-only changes and renames
/// away from the file do not.
pub fn is_source_change(event: &Event, source: &Path) -> bool {
    match event.kind {
        EventKind::Create(_) => event.paths.iter().any(|p| p == source),
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => false,
        // [from, to]: only the destination matters
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.last().is_some_and(|p| p == source)
        }
        EventKind::Modify(_) => event.paths.iter().any(|p| p == source),
        _ => false,
    }
}
