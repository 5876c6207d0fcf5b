//! Reload triggers.
//!
//! Manual reloads are plain `reload()` calls. The two background strategies
//! live here:
//!
//! | Trigger | Thread                     | Fires on                        |
//! |---------|----------------------------|---------------------------------|
//! | timer   | one named thread per start | every `interval`                |
//! | watch   | one named thread per start | writes to the exact source file |
//!
//! Every start returns a [`TriggerHandle`]. Triggers only hold a weak
//! reference to their proxy, so a dropped proxy ends their threads at the
//! next tick or file event.

pub mod timer;
pub mod watch;

use std::fmt;
use std::path::Path;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::Sender;
use notify::RecommendedWatcher;
use parking_lot::Mutex;

use super::error::ReloadError;
use super::proxy::ReloadOutcome;
use super::target::Kind;

/// Stack size of trigger threads. Reloads run the interpreter, which
/// recurses up to `MAX_CALL_DEPTH` script calls.
const RELOAD_STACK_SIZE: usize = 16 * 1024 * 1024;

/// Anything a trigger can reload.
pub trait Reloadable: Send + Sync {
    fn name(&self) -> &str;
    fn kind(&self) -> Kind;
    fn source_path(&self) -> &Path;
    fn reload(&self) -> Result<ReloadOutcome, ReloadError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    Timer(Duration),
    Watch,
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerKind::Timer(interval) => write!(f, "timer every {interval:?}"),
            TriggerKind::Watch => f.write_str("watch"),
        }
    }
}

enum Running {
    Timer {
        stop: Sender<()>,
        thread: JoinHandle<()>,
    },
    Watch {
        watcher: RecommendedWatcher,
        stop: Sender<()>,
        thread: JoinHandle<()>,
    },
}

/// Owner of one running trigger.
///
/// Dropping the handle disconnects the trigger without waiting for it.
/// [`TriggerHandle::stop`] also waits until the trigger thread has exited,
/// [`TriggerHandle::detach`] keeps it running until the process exits.
pub struct TriggerHandle {
    kind: TriggerKind,
    label: String,
    running: Option<Running>,
}

impl TriggerHandle {
    fn timer(label: String, interval: Duration, stop: Sender<()>, thread: JoinHandle<()>) -> Self {
        Self {
            kind: TriggerKind::Timer(interval),
            label,
            running: Some(Running::Timer { stop, thread }),
        }
    }

    fn watch(label: String, watcher: RecommendedWatcher, stop: Sender<()>, thread: JoinHandle<()>) -> Self {
        Self {
            kind: TriggerKind::Watch,
            label,
            running: Some(Running::Watch {
                watcher,
                stop,
                thread,
            }),
        }
    }

    pub fn kind(&self) -> TriggerKind {
        self.kind
    }

    /// What is being reloaded, e.g. ``class `Car` ``.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_finished(&self) -> bool {
        match &self.running {
            Some(Running::Timer { thread, .. } | Running::Watch { thread, .. }) => thread.is_finished(),
            None => true,
        }
    }

    /// Halt the trigger. No reload starts after this returns.
    ///
    /// Called from the trigger's own thread (a reload that stops its
    /// trigger) it only disconnects, since a thread cannot join itself.
    pub fn stop(mut self) {
        match self.running.take() {
            Some(Running::Timer { stop, thread }) => join(stop, thread),
            Some(Running::Watch {
                watcher,
                stop,
                thread,
            }) => {
                drop(watcher);
                join(stop, thread);
            }
            None => {}
        }
        crate::debug!("reload"; "stopped {} for {}", self.kind, self.label);
    }

    /// Let the trigger run until the process exits.
    pub fn detach(self) {
        std::mem::forget(self);
    }
}

impl fmt::Debug for TriggerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerHandle")
            .field("kind", &self.kind)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Triggers kept alive by a proxy (started from scripts or `autoreload`).
#[derive(Default)]
pub struct TriggerSet {
    handles: Mutex<Vec<TriggerHandle>>,
}

impl TriggerSet {
    pub fn push(&self, handle: TriggerHandle) {
        self.handles.lock().push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop every kept trigger. Returns how many were stopped.
    pub fn stop_all(&self) -> usize {
        // Release the lock before joining: a stopping timer may be mid-reload
        let handles = std::mem::take(&mut *self.handles.lock());
        let count = handles.len();
        handles.into_iter().for_each(TriggerHandle::stop);
        count
    }
}

fn join(stop: Sender<()>, thread: JoinHandle<()>) {
    drop(stop);
    if thread.thread().id() != thread::current().id() {
        thread.join().ok();
    }
}

fn label(target: &dyn Reloadable) -> String {
    format!("{} `{}`", target.kind(), target.name())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Weak};
    use std::time::Instant;

    /// Counts reloads instead of touching any file.
    pub(crate) struct Counter {
        pub reloads: AtomicUsize,
        pub path: PathBuf,
    }

    impl Counter {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                reloads: AtomicUsize::new(0),
                path: PathBuf::from("/nowhere/counter.rl"),
            })
        }

        pub fn count(&self) -> usize {
            self.reloads.load(Ordering::SeqCst)
        }
    }

    impl Reloadable for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn kind(&self) -> Kind {
            Kind::Function
        }

        fn source_path(&self) -> &Path {
            &self.path
        }

        fn reload(&self) -> Result<ReloadOutcome, ReloadError> {
            self.reloads.fetch_add(1, Ordering::SeqCst);
            Ok(ReloadOutcome::Swapped { retagged: 0 })
        }
    }

    pub(crate) fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    #[test]
    fn test_trigger_set_stop_all() {
        let counter = Counter::new();
        let weak: Weak<dyn Reloadable> = Arc::downgrade(&counter) as Weak<Counter>;
        let set = TriggerSet::default();
        set.push(timer::start(weak.clone(), Duration::from_millis(10)).unwrap());
        set.push(timer::start(weak, Duration::from_millis(10)).unwrap());

        assert_eq!(set.len(), 2);
        assert_eq!(set.stop_all(), 2);
        assert!(set.is_empty());

        let after = counter.count();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(counter.count(), after);
    }

    #[test]
    fn test_trigger_kind_display() {
        assert_eq!(
            TriggerKind::Timer(Duration::from_millis(1500)).to_string(),
            "timer every 1.5s"
        );
        assert_eq!(TriggerKind::Watch.to_string(), "watch");
    }

    #[test]
    fn test_label() {
        let counter = Counter::new();
        assert_eq!(label(counter.as_ref()), "function `counter`");
    }
}
