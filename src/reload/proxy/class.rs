//! Class proxy: constructs through the current class and re-tags live
//! instances on reload.

use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::ReentrantMutex;

use super::{ReloadOutcome, finish};
use crate::reload::error::ReloadError;
use crate::reload::exec;
use crate::reload::registry::InstanceRegistry;
use crate::reload::target::{Kind, Target};
use crate::reload::trigger::{Reloadable, TriggerSet};
use crate::script::{Class, Instance, RuntimeError, Value, interp};

pub struct ClassProxy {
    target: Target,
    current: ArcSwap<Class>,
    instances: InstanceRegistry,
    /// Held across locate, execute, swap and re-tag. Reentrant because
    /// re-executing a class body may construct through this same proxy.
    reload_lock: ReentrantMutex<()>,
    pub(super) triggers: TriggerSet,
}

impl ClassProxy {
    pub fn new(class: Arc<Class>) -> Arc<Self> {
        Arc::new(Self {
            target: Target::of_class(&class),
            current: ArcSwap::new(class),
            instances: InstanceRegistry::new(),
            reload_lock: ReentrantMutex::new(()),
            triggers: TriggerSet::default(),
        })
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// The most recently loaded version of the class.
    pub fn current(&self) -> Arc<Class> {
        self.current.load_full()
    }

    /// Instantiate the current class and track the result.
    pub fn construct(&self, args: &[Value]) -> Result<Arc<Instance>, RuntimeError> {
        let class = self.current();
        let instance = interp::construct(&class, args)?;

        let _guard = self.reload_lock.lock();
        self.instances.register(&instance);
        // A reload finished between construction and registration
        let latest = self.current();
        if !Arc::ptr_eq(&latest, &class) {
            instance.retag(latest);
        }
        Ok(instance)
    }

    /// Class attribute of the current version.
    pub fn get_attr(&self, name: &str) -> Option<Value> {
        self.current().attr(name)
    }

    pub fn live_instances(&self) -> usize {
        self.instances.live()
    }

    /// Re-extract and re-execute the class, then re-tag every live instance.
    pub fn reload(&self) -> Result<ReloadOutcome, ReloadError> {
        let _guard = self.reload_lock.lock();
        let result = exec::reload_class(&self.target).map(|class| {
            self.current.store(Arc::clone(&class));
            self.instances.retag_all(&class)
        });
        finish(&self.target, result)
    }
}

impl Reloadable for ClassProxy {
    fn name(&self) -> &str {
        self.target.name()
    }

    fn kind(&self) -> Kind {
        Kind::Class
    }

    fn source_path(&self) -> &Path {
        self.target.path()
    }

    fn reload(&self) -> Result<ReloadOutcome, ReloadError> {
        ClassProxy::reload(self)
    }
}

impl std::fmt::Debug for ClassProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassProxy")
            .field("target", &self.target)
            .field("live_instances", &self.live_instances())
            .finish_non_exhaustive()
    }
}
