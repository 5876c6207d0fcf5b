//! Function proxy: calls forward to the current body.

use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use super::{ReloadOutcome, finish};
use crate::reload::error::ReloadError;
use crate::reload::exec;
use crate::reload::target::{Kind, Target};
use crate::reload::trigger::{Reloadable, TriggerSet};
use crate::script::{Function, RuntimeError, Value, interp};

pub struct FunctionProxy {
    /// Path and module come from here, never from the current body.
    target: Target,
    current: ArcSwap<Function>,
    reload_lock: Mutex<()>,
    pub(super) triggers: TriggerSet,
}

impl FunctionProxy {
    pub fn new(function: Arc<Function>) -> Arc<Self> {
        Arc::new(Self {
            target: Target::of_function(&function),
            current: ArcSwap::new(function),
            reload_lock: Mutex::new(()),
            triggers: TriggerSet::default(),
        })
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn current(&self) -> Arc<Function> {
        self.current.load_full()
    }

    /// Call the current body. A reload during the call does not affect it.
    pub fn call(&self, args: &[Value]) -> Result<Value, RuntimeError> {
        interp::call_value(&Value::Function(self.current()), args)
    }

    pub fn reload(&self) -> Result<ReloadOutcome, ReloadError> {
        let _guard = self.reload_lock.lock();
        let result = exec::reload_function(&self.target).map(|function| {
            self.current.store(function);
            0
        });
        finish(&self.target, result)
    }
}

impl Reloadable for FunctionProxy {
    fn name(&self) -> &str {
        self.target.name()
    }

    fn kind(&self) -> Kind {
        Kind::Function
    }

    fn source_path(&self) -> &Path {
        self.target.path()
    }

    fn reload(&self) -> Result<ReloadOutcome, ReloadError> {
        FunctionProxy::reload(self)
    }
}

impl std::fmt::Debug for FunctionProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionProxy")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}
