// Unit descriptors — named capability sets with explicit delegation chains.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use serde_json::Value;

/// Capability name invoked during the construct phase.
pub const CONSTRUCT: &str = "construct";
/// Capability name invoked during the init phase.
pub const INIT: &str = "init";

/// Shared, lockable handle to a registered unit. Composition replaces the
/// handle bound to a name; closures that captured the old handle keep seeing
/// the descriptor they were built against.
pub type UnitHandle = Arc<Mutex<UnitDescriptor>>;

pub type CapResult = Result<Value>;
pub type CapFn = Arc<dyn Fn(Delegate<'_>, &[Value]) -> CapResult + Send + Sync>;

type IdentityHook = Arc<dyn Fn(&UnitHandle) + Send + Sync>;

/// How a unit participates in composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// Capabilities chain; same-named implementations layer with delegate
    /// access to the overridden one.
    Instantiable,
    /// A plain field bag; composition is a shallow field merge.
    Data,
}

/// One unit capability: an ordered delegation chain, most-derived first.
/// Invocation enters at the head; each layer may reach the next through the
/// [`Delegate`] it receives.
#[derive(Clone, Default)]
pub struct Capability {
    chain: Vec<CapFn>,
}

impl Capability {
    pub fn from_fn(
        f: impl Fn(Delegate<'_>, &[Value]) -> CapResult + Send + Sync + 'static,
    ) -> Self {
        Self {
            chain: vec![Arc::new(f)],
        }
    }

    /// Number of layered implementations.
    pub fn depth(&self) -> usize {
        self.chain.len()
    }

    /// Invoke the most-derived implementation, handing it a delegate over
    /// the rest of the chain. An empty chain is a no-op.
    pub fn invoke(&self, args: &[Value]) -> CapResult {
        match self.chain.split_first() {
            Some((head, rest)) => head(Delegate { rest }, args),
            None => Ok(Value::Null),
        }
    }

    /// Append `base`'s chain below this one, keeping `self` most-derived.
    pub(crate) fn layer_over(&mut self, base: &Capability) {
        self.chain.extend(base.chain.iter().cloned());
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("depth", &self.chain.len())
            .finish()
    }
}

/// Handle to the overridden implementations below the current chain layer,
/// bound for a single invocation.
pub struct Delegate<'a> {
    rest: &'a [CapFn],
}

impl Delegate<'_> {
    /// Whether an overridden implementation exists.
    pub fn exists(&self) -> bool {
        !self.rest.is_empty()
    }

    /// Invoke the next implementation down the chain.
    pub fn call(&self, args: &[Value]) -> CapResult {
        match self.rest.split_first() {
            Some((next, rest)) => next(Delegate { rest }, args),
            None => Err(anyhow!("no overridden implementation to delegate to")),
        }
    }
}

/// In-memory representation of a loadable unit: its identity, declared kind,
/// capability set and data fields, plus the per-cycle phase flags.
#[derive(Clone)]
pub struct UnitDescriptor {
    pub name: String,
    pub kind: UnitKind,
    capabilities: BTreeMap<String, Capability>,
    fields: BTreeMap<String, Value>,
    pub(crate) constructed: bool,
    pub(crate) initialized: bool,
    pub(crate) identity_hook: Option<IdentityHook>,
}

impl UnitDescriptor {
    pub fn new(name: impl Into<String>, kind: UnitKind) -> Self {
        Self {
            name: name.into(),
            kind,
            capabilities: BTreeMap::new(),
            fields: BTreeMap::new(),
            constructed: false,
            initialized: false,
            identity_hook: None,
        }
    }

    pub fn instantiable(name: impl Into<String>) -> Self {
        Self::new(name, UnitKind::Instantiable)
    }

    pub fn data(name: impl Into<String>) -> Self {
        Self::new(name, UnitKind::Data)
    }

    pub fn with_capability(
        mut self,
        name: impl Into<String>,
        f: impl Fn(Delegate<'_>, &[Value]) -> CapResult + Send + Sync + 'static,
    ) -> Self {
        self.capabilities.insert(name.into(), Capability::from_fn(f));
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Hook invoked with the final composed handle, so closures built during
    /// composition can reach the unit's eventual identity.
    pub fn with_identity_hook(mut self, hook: impl Fn(&UnitHandle) + Send + Sync + 'static) -> Self {
        self.identity_hook = Some(Arc::new(hook));
        self
    }

    pub fn capability(&self, name: &str) -> Option<&Capability> {
        self.capabilities.get(name)
    }

    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    pub fn set_capability(&mut self, name: impl Into<String>, capability: Capability) {
        self.capabilities.insert(name.into(), capability);
    }

    pub fn capability_names(&self) -> impl Iterator<Item = &str> {
        self.capabilities.keys().map(String::as_str)
    }

    pub(crate) fn capabilities(&self) -> &BTreeMap<String, Capability> {
        &self.capabilities
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    pub(crate) fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    pub fn constructed(&self) -> bool {
        self.constructed
    }

    pub fn initialized(&self) -> bool {
        self.initialized
    }

    /// Wrap into a shareable handle.
    pub fn into_handle(self) -> UnitHandle {
        Arc::new(Mutex::new(self))
    }
}

impl fmt::Debug for UnitDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("capabilities", &self.capabilities.keys().collect::<Vec<_>>())
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("constructed", &self.constructed)
            .field("initialized", &self.initialized)
            .finish()
    }
}
