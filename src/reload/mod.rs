//! Reload Module
//!
//! Replaces the implementation of a live class or function with a freshly
//! executed version of its own source, keeping existing instances.
//!
//! # Architecture
//!
//! ```text
//! trigger ──> Proxy::reload ──> locate ──> exec ──> swap ──> re-tag
//! (manual,     (per-proxy      (file →    (module   (ArcSwap) (instance
//!  timer,       lock)           text)      globals)             registry)
//!  watch)
//! ```
//!
//! # Modules
//!
//! - `target` - What was decorated: name, kind, declaring file, module
//! - `locate` - Extract the current text of one definition from its file
//! - `exec` - Re-execute that text inside the owning module
//! - `registry` - Weak references to instances built through a proxy
//! - `proxy` - Class and function proxies
//! - `trigger` - Timer and filesystem-watch reload triggers
//! - `error` - Recoverable and fatal reload errors

pub mod error;
pub mod exec;
pub mod locate;
pub mod proxy;
pub mod registry;
pub mod target;
pub mod trigger;

pub use error::ReloadError;
pub use proxy::{ClassProxy, FunctionProxy, Proxy, ReloadOutcome};
pub use target::{Kind, Target};
pub use trigger::{Reloadable, TriggerHandle, TriggerKind};

use crate::script::Value;

/// Decorator entry point: wrap a class or function in its proxy.
pub fn reloadr(target: Value) -> Result<Proxy, ReloadError> {
    let proxy = Proxy::wrap(target)?;
    crate::debug!("reload"; "tracking {}", proxy.target());
    Ok(proxy)
}

/// Decorator entry point: wrap, then reload on every save of the file.
///
/// The watch trigger is owned by the proxy and stops with it.
pub fn autoreload(target: Value) -> Result<Proxy, ReloadError> {
    let proxy = reloadr(target)?;
    let handle = proxy.start_watch_reload()?;
    proxy.keep_trigger(handle);
    Ok(proxy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    use tempfile::TempDir;

    use crate::reload::trigger::tests::wait_until;
    use crate::script::Module;

    #[test]
    fn test_reloadr_picks_variant() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kinds.rl");
        fs::write(&path, "@reloadr\nclass Car {}\n@reloadr\nfn drive() {}\n").unwrap();
        let module = Module::load(&path).unwrap();

        let car = module.get("Car").unwrap();
        let drive = module.get("drive").unwrap();
        assert_eq!(car.as_proxy().unwrap().kind(), Kind::Class);
        assert_eq!(drive.as_proxy().unwrap().kind(), Kind::Function);
        assert_eq!(car.to_string(), "<reloadr class Car>");
    }

    #[test]
    fn test_autoreload_watches_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("auto.rl");
        fs::write(&path, "@autoreload\nfn value() { return 1; }\n").unwrap();
        let module = Module::load(&path).unwrap();

        let proxy = module.get("value").unwrap().as_proxy().unwrap().clone();
        assert_eq!(proxy.trigger_count(), 1);

        fs::write(&path, "@autoreload\nfn value() { return 2; }\n").unwrap();
        assert!(wait_until(Duration::from_secs(5), || {
            module.call("value", &[]).unwrap() == Value::Int(2)
        }));
        assert_eq!(proxy.stop_triggers(), 1);
    }

    #[test]
    fn test_stacked_decorators_wrap_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stacked.rl");
        fs::write(&path, "@autoreload\n@reloadr\nfn f() { return 1; }\n").unwrap();
        let module = Module::load(&path).unwrap();

        let proxy = module.get("f").unwrap().as_proxy().unwrap().clone();
        assert_eq!(proxy.trigger_count(), 1);
        proxy.stop_triggers();
    }
}
