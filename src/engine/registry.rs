// Ordered unit store — registration order for phase passes, name bindings for
// resolution, and the deferred extension queue.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::unit::{UnitDescriptor, UnitHandle};

/// When an extension declaration is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionMode {
    /// Resolve at declaration time if the source exists, else fail soft.
    Immediate,
    /// If the source is not yet available, park the declaration and resolve
    /// it during the lifecycle run.
    DeferredStatic,
}

/// A parked extension request, resolved once its source exists.
#[derive(Debug, Clone)]
pub struct ExtensionDeclaration {
    pub target: String,
    pub source: String,
    pub mode: ExtensionMode,
}

#[derive(Default)]
struct RegistryInner {
    /// Phase-pass order. Registration order, no dedup.
    order: Vec<UnitHandle>,
    /// Name resolution. Latest registration wins the binding.
    bindings: HashMap<String, UnitHandle>,
    deferred: Vec<ExtensionDeclaration>,
}

/// Ordered store of registered units and deferred extension declarations.
#[derive(Default)]
pub struct UnitRegistry {
    inner: Mutex<RegistryInner>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a unit. Appends to the phase order and binds the name.
    /// Duplicate registration is the caller's responsibility; the newest
    /// handle takes over the name binding.
    pub fn register(&self, descriptor: UnitDescriptor) -> UnitHandle {
        let name = descriptor.name.clone();
        let handle = descriptor.into_handle();

        let mut inner = self.inner.lock();
        inner.order.push(handle.clone());
        inner.bindings.insert(name, handle.clone());
        handle
    }

    /// Resolve a unit by name.
    pub fn lookup(&self, name: &str) -> Option<UnitHandle> {
        self.inner.lock().bindings.get(name).cloned()
    }

    /// Replace `old` with `new` in place: the phase-order slot holding `old`
    /// and the binding for `name` both point at `new` afterwards.
    pub fn replace(&self, name: &str, old: &UnitHandle, new: UnitHandle) {
        let mut inner = self.inner.lock();
        for slot in inner.order.iter_mut() {
            if Arc::ptr_eq(slot, old) {
                *slot = new.clone();
                break;
            }
        }
        inner.bindings.insert(name.to_string(), new);
    }

    /// Park an extension declaration for resolution during the lifecycle run.
    pub fn defer(&self, declaration: ExtensionDeclaration) {
        self.inner.lock().deferred.push(declaration);
    }

    /// Drain the parked declarations in declaration order.
    pub fn take_deferred(&self) -> Vec<ExtensionDeclaration> {
        std::mem::take(&mut self.inner.lock().deferred)
    }

    /// Snapshot the phase-pass order.
    pub fn phase_order(&self) -> Vec<UnitHandle> {
        self.inner.lock().order.clone()
    }

    /// The unit at phase-order position `index`, if any. Phase passes walk
    /// by index so units registered mid-pass are still visited.
    pub fn unit_at(&self, index: usize) -> Option<UnitHandle> {
        self.inner.lock().order.get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().order.is_empty()
    }

    /// Drop all units, bindings and deferred declarations.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.order.clear();
        inner.bindings.clear();
        inner.deferred.clear();
    }
}
