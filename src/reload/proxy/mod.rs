//! Reload proxies.
//!
//! A proxy stands in for a decorated class or function. It holds the
//! current implementation in an [`arc_swap::ArcSwap`] slot: callers load it
//! without blocking, and a reload replaces it wholesale. Reloads of one
//! proxy are serialized by a per-proxy lock, so two triggers never
//! interleave their locate, execute and swap steps.

mod class;
mod function;

pub use class::ClassProxy;
pub use function::FunctionProxy;

use std::path::Path;
use std::sync::{Arc, Weak};
use std::time::Duration;

use super::error::ReloadError;
use super::target::{Kind, Target};
use super::trigger::{self, Reloadable, TriggerHandle, TriggerSet};
use crate::logger::{status_error, status_success};
use crate::script::value::NativeFn;
use crate::script::{RuntimeError, Value};

/// Result of a reload that did not fail hard.
#[derive(Debug)]
pub enum ReloadOutcome {
    /// New implementation installed. `retagged` counts live instances
    /// moved to it (always 0 for functions).
    Swapped { retagged: usize },
    /// The file could not be used right now. The previous implementation
    /// stays live and the error has been reported.
    Rejected(ReloadError),
}

impl ReloadOutcome {
    pub fn is_swapped(&self) -> bool {
        matches!(self, ReloadOutcome::Swapped { .. })
    }
}

/// Report a reload result and sort recoverable errors from fatal ones.
fn finish(target: &Target, result: Result<usize, ReloadError>) -> Result<ReloadOutcome, ReloadError> {
    match result {
        Ok(retagged) => {
            let message = match target.kind() {
                Kind::Class => format!(
                    "reloaded {target} ({retagged} live instance{})",
                    if retagged == 1 { "" } else { "s" }
                ),
                Kind::Function => format!("reloaded {target}"),
            };
            status_success(&message);
            Ok(ReloadOutcome::Swapped { retagged })
        }
        Err(err) if err.is_recoverable() => {
            status_error(&format!("reload failed: {target}"), &err.to_string());
            Ok(ReloadOutcome::Rejected(err))
        }
        Err(err) => {
            status_error(&format!("reload aborted: {target}"), &err.to_string());
            Err(err)
        }
    }
}

// ============================================================================
// Proxy
// ============================================================================

/// Either proxy variant. Cloning shares the proxy.
#[derive(Debug, Clone)]
pub enum Proxy {
    Class(Arc<ClassProxy>),
    Function(Arc<FunctionProxy>),
}

impl Proxy {
    /// Wrap a class or function. A value that already is a proxy is
    /// returned as-is.
    pub fn wrap(value: Value) -> Result<Self, ReloadError> {
        match value {
            Value::Class(class) => Ok(Proxy::Class(ClassProxy::new(class))),
            Value::Function(function) => Ok(Proxy::Function(FunctionProxy::new(function))),
            Value::Proxy(proxy) => Ok(proxy),
            other => Err(ReloadError::Unsupported(other.type_name())),
        }
    }

    pub fn target(&self) -> &Target {
        match self {
            Proxy::Class(proxy) => proxy.target(),
            Proxy::Function(proxy) => proxy.target(),
        }
    }

    pub fn name(&self) -> &str {
        self.target().name()
    }

    pub fn kind(&self) -> Kind {
        self.target().kind()
    }

    pub fn source_path(&self) -> &Path {
        self.target().path()
    }

    pub fn as_class(&self) -> Option<&Arc<ClassProxy>> {
        match self {
            Proxy::Class(proxy) => Some(proxy),
            Proxy::Function(_) => None,
        }
    }

    pub fn as_function(&self) -> Option<&Arc<FunctionProxy>> {
        match self {
            Proxy::Function(proxy) => Some(proxy),
            Proxy::Class(_) => None,
        }
    }

    /// Both handles share the same proxy.
    pub fn same(&self, other: &Proxy) -> bool {
        match (self, other) {
            (Proxy::Class(a), Proxy::Class(b)) => Arc::ptr_eq(a, b),
            (Proxy::Function(a), Proxy::Function(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Manual trigger: reload synchronously on the calling thread.
    pub fn reload(&self) -> Result<ReloadOutcome, ReloadError> {
        match self {
            Proxy::Class(proxy) => proxy.reload(),
            Proxy::Function(proxy) => proxy.reload(),
        }
    }

    /// Call the proxy: construct for classes, invoke for functions.
    pub fn call(&self, args: &[Value]) -> Result<Value, RuntimeError> {
        match self {
            Proxy::Class(proxy) => proxy.construct(args).map(Value::Instance),
            Proxy::Function(proxy) => proxy.call(args),
        }
    }

    /// Attribute access from scripts.
    ///
    /// The reload members (`_reload`, `_start_timer_reload`,
    /// `_start_watch_reload`, `_stop_reload`) are served by the proxy,
    /// everything else is forwarded to the current class.
    pub fn get_attr(&self, name: &str) -> Option<Value> {
        let proxy = self.clone();
        let member = match name {
            "_reload" => NativeFn::new(name, Some(0), move |_| {
                proxy
                    .reload()
                    .map(|outcome| Value::Bool(outcome.is_swapped()))
                    .map_err(script_error)
            }),
            "_start_timer_reload" => NativeFn::new(name, Some(1), move |args| {
                let interval = interval_arg(&args[0])?;
                let handle = proxy.start_timer_reload(interval).map_err(script_error)?;
                proxy.keep_trigger(handle);
                Ok(Value::Nil)
            }),
            "_start_watch_reload" => NativeFn::new(name, Some(0), move |_| {
                let handle = proxy.start_watch_reload().map_err(script_error)?;
                proxy.keep_trigger(handle);
                Ok(Value::Nil)
            }),
            "_stop_reload" => NativeFn::new(name, Some(0), move |_| {
                Ok(Value::Int(proxy.stop_triggers() as i64))
            }),
            _ => {
                return match self {
                    Proxy::Class(class) => class.get_attr(name),
                    Proxy::Function(_) => None,
                };
            }
        };
        Some(Value::Native(member))
    }

    // ========================================================================
    // Triggers
    // ========================================================================

    /// Start a background thread reloading every `interval`.
    pub fn start_timer_reload(&self, interval: Duration) -> Result<TriggerHandle, ReloadError> {
        trigger::timer::start(self.reloadable(), interval)
    }

    /// Start watching the source file; every write reloads.
    pub fn start_watch_reload(&self) -> Result<TriggerHandle, ReloadError> {
        trigger::watch::start(self.reloadable())
    }

    /// Let the proxy own `handle`: the trigger runs until
    /// [`Proxy::stop_triggers`] or until the proxy is dropped.
    pub fn keep_trigger(&self, handle: TriggerHandle) {
        self.triggers().push(handle);
    }

    /// Stop every trigger the proxy owns. Returns how many were stopped.
    pub fn stop_triggers(&self) -> usize {
        self.triggers().stop_all()
    }

    /// Number of triggers the proxy owns.
    pub fn trigger_count(&self) -> usize {
        self.triggers().len()
    }

    fn triggers(&self) -> &TriggerSet {
        match self {
            Proxy::Class(proxy) => &proxy.triggers,
            Proxy::Function(proxy) => &proxy.triggers,
        }
    }

    fn reloadable(&self) -> Weak<dyn Reloadable> {
        match self {
            Proxy::Class(proxy) => Arc::downgrade(proxy) as Weak<dyn Reloadable>,
            Proxy::Function(proxy) => Arc::downgrade(proxy) as Weak<dyn Reloadable>,
        }
    }
}

fn script_error(err: ReloadError) -> RuntimeError {
    RuntimeError::Reload(format!("{:#}", anyhow::Error::new(err)))
}

fn interval_arg(value: &Value) -> Result<Duration, RuntimeError> {
    value
        .as_float()
        .filter(|secs| *secs > 0.0)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| {
            RuntimeError::Type(format!(
                "reload interval must be a positive number of seconds, got {value}"
            ))
        })
}

#[cfg(test)]
mod tests;
