//! Weak registry of instances created through a class proxy.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::script::{Class, Instance};

/// Non-owning references to every instance a proxy constructed.
///
/// Instance lifetime stays with the application: dead slots are skipped
/// (never dereferenced) and pruned. Append and iterate share one lock.
#[derive(Default)]
pub struct InstanceRegistry {
    slots: Mutex<Vec<Weak<Instance>>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, instance: &Arc<Instance>) {
        let mut slots = self.slots.lock();
        // Prune before the vector would grow
        if slots.len() == slots.capacity() {
            slots.retain(|slot| slot.strong_count() > 0);
        }
        slots.push(Arc::downgrade(instance));
    }

    /// Point every live instance at `class`. Returns how many were re-tagged.
    pub fn retag_all(&self, class: &Arc<Class>) -> usize {
        let mut retagged = 0;
        self.slots.lock().retain(|slot| match slot.upgrade() {
            Some(instance) => {
                instance.retag(Arc::clone(class));
                retagged += 1;
                true
            }
            None => false,
        });
        retagged
    }

    /// Number of instances still alive.
    pub fn live(&self) -> usize {
        self.slots
            .lock()
            .iter()
            .filter(|slot| slot.strong_count() > 0)
            .count()
    }

    /// Number of slots held, dead ones included.
    pub fn slots(&self) -> usize {
        self.slots.lock().len()
    }
}
