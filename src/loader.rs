// Loader facade — one instance per loading context, wiring the fetch
// coordinator, unit registry and lifecycle orchestrator together.

use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::config::{LoaderConfig, PACKAGE_ASSETS_DIR};
use crate::debug::DebugSink;
use crate::engine::compose::resolve_extension;
use crate::engine::coordinator::FetchCoordinator;
use crate::engine::lifecycle::{LifecycleOrchestrator, Phase, ReadySignal};
use crate::engine::package::{extract_unit_name, package_base};
use crate::engine::registry::{ExtensionDeclaration, ExtensionMode, UnitRegistry};
use crate::engine::unit::{Capability, UnitDescriptor, UnitHandle, CONSTRUCT};
use crate::errors::ErrorCollector;
use crate::source::traits::ArtifactSource;

/// Artifact loader and lifecycle orchestrator for one loading context.
///
/// Fetching and lifecycle passes run as tokio tasks, so every method that
/// issues or completes work must be called within a runtime. The host raises
/// [`Loader::ready_signal`] once; lifecycle passes wait on it before
/// touching any unit.
pub struct Loader {
    config: LoaderConfig,
    sink: DebugSink,
    source: Arc<dyn ArtifactSource>,
    errors: Arc<ErrorCollector>,
    registry: Arc<UnitRegistry>,
    ready: Arc<ReadySignal>,
    generation: Arc<AtomicU64>,
    orchestrator: Arc<LifecycleOrchestrator>,
    coordinator: Arc<FetchCoordinator>,
    packages: Mutex<HashMap<String, Arc<Loader>>>,
}

impl Loader {
    pub fn new(config: LoaderConfig, source: Arc<dyn ArtifactSource>) -> Self {
        Self::with_ready_signal(config, source, Arc::new(ReadySignal::new()))
    }

    /// Build a loader sharing an existing readiness signal. Sub-loaders and
    /// any other loaders on the same page share one signal.
    pub fn with_ready_signal(
        config: LoaderConfig,
        source: Arc<dyn ArtifactSource>,
        ready: Arc<ReadySignal>,
    ) -> Self {
        let sink = DebugSink::new(&config.name, config.debug);
        let errors = Arc::new(ErrorCollector::new());
        let registry = Arc::new(UnitRegistry::new());
        let generation = Arc::new(AtomicU64::new(0));

        let orchestrator = Arc::new(LifecycleOrchestrator::new(
            Arc::clone(&registry),
            Arc::clone(&ready),
            Arc::clone(&errors),
            sink.clone(),
            Arc::clone(&generation),
        ));

        let coordinator = Arc::new(FetchCoordinator::new(
            Arc::clone(&source),
            Arc::clone(&orchestrator),
            Arc::clone(&errors),
            sink.clone(),
            config.base_url.clone(),
            Duration::from_millis(config.settle_delay_ms),
            Arc::clone(&generation),
        ));

        Self {
            config,
            sink,
            source,
            errors,
            registry,
            ready,
            generation,
            orchestrator,
            coordinator,
            packages: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn phase(&self) -> Phase {
        self.orchestrator.phase()
    }

    pub fn ready_signal(&self) -> Arc<ReadySignal> {
        Arc::clone(&self.ready)
    }

    pub fn registry(&self) -> &Arc<UnitRegistry> {
        &self.registry
    }

    pub fn errors(&self) -> &Arc<ErrorCollector> {
        &self.errors
    }

    /// Store the callback fired when the current cycle completes.
    pub fn on_complete(&self, callback: impl FnOnce() + Send + 'static) {
        self.orchestrator.set_on_complete(Box::new(callback));
    }

    /// Request an artifact fetch. Duplicate locators within a cycle are
    /// logged no-ops. Returns whether a fetch was actually issued.
    pub fn request_fetch(&self, locator: &str) -> bool {
        self.coordinator.request(locator)
    }

    /// Reset to a fresh cycle, store `callback` as the completion callback,
    /// then request `locator`. For on-demand loading of a new artifact set.
    /// Refused (returning `false`) while a lifecycle pass is mid-flight.
    pub fn request_fetch_with_reset(
        &self,
        locator: &str,
        callback: impl FnOnce() + Send + 'static,
    ) -> bool {
        if !self.reset() {
            return false;
        }
        self.on_complete(callback);
        self.request_fetch(locator)
    }

    /// Signal completion immediately instead of waiting for the outstanding
    /// fetch count. For pages whose artifacts are compiled into one bundle.
    pub fn force_complete(&self) {
        self.coordinator.force_complete();
    }

    /// Clear all loading state for a fresh start: tracked requests, the
    /// completion callback, registered units, collected errors and package
    /// sub-loaders. Refused (returning `false`) while a lifecycle pass is
    /// mid-flight; in-flight fetches are not cancelled, their completions
    /// become stale.
    pub fn reset(&self) -> bool {
        if self.orchestrator.mid_pass() {
            self.sink.log("reset refused: lifecycle pass in progress");
            return false;
        }

        self.sink
            .log(format!("flushing {} includes", self.config.name));

        self.generation
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.coordinator.clear();
        self.orchestrator.reset();
        self.errors.clear();
        self.registry.clear();
        self.packages.lock().clear();
        true
    }

    /// Register a unit for the lifecycle passes. Instantiable-kind units
    /// that should not participate in construct/extend/init don't need
    /// registration.
    pub fn register(&self, descriptor: UnitDescriptor) -> UnitHandle {
        self.registry.register(descriptor)
    }

    /// Compose `source`'s capabilities into `target`, replacing the target
    /// binding with the result. With [`ExtensionMode::DeferredStatic`] and a
    /// source that has not registered yet, the declaration is parked and
    /// resolved during the lifecycle run. Unresolvable requests degrade to
    /// the unmodified target; a missing target yields `None`.
    pub fn extend(
        &self,
        target: &str,
        source: &str,
        mode: ExtensionMode,
    ) -> Option<UnitHandle> {
        match mode {
            ExtensionMode::Immediate => {
                resolve_extension(&self.sink, &self.registry, target, source)
            }
            ExtensionMode::DeferredStatic => {
                if self.registry.lookup(source).is_some() {
                    resolve_extension(&self.sink, &self.registry, target, source)
                } else {
                    self.sink.log(format!(
                        "delayed extending {} with {} [source hasn't loaded yet]",
                        target, source
                    ));
                    self.registry.defer(ExtensionDeclaration {
                        target: target.to_string(),
                        source: source.to_string(),
                        mode,
                    });
                    self.registry.lookup(target)
                }
            }
        }
    }

    /// Lightweight execute path for lazily loaded packages, bypassing the
    /// main state machine: fetch one artifact, extract its unit name from
    /// the raw payload, attach package metadata (an `assets` field, an
    /// `asset_url` capability and a private sub-loader) to the unit it
    /// registered, then invoke only its construct capability.
    pub async fn execute(&self, locator: &str) -> Result<UnitHandle> {
        let url = self.coordinator.resolve(locator);
        self.sink.log(format!("executing: {}", url));

        let payload = self.source.fetch(&url).await?;

        let Some(name) = extract_unit_name(&payload) else {
            bail!("no unit name marker in {}", url);
        };
        self.sink.log(format!("unit name should be: {}", name));

        let Some(handle) = self.registry.lookup(&name) else {
            bail!("executed artifact did not register [{}]", name);
        };

        let base = package_base(&url);
        let assets = format!("{}{}", base, PACKAGE_ASSETS_DIR);
        {
            let mut unit = handle.lock();
            unit.set_field("assets", Value::String(assets.clone()));
            let assets_base = assets.clone();
            unit.set_capability(
                "asset_url",
                Capability::from_fn(move |_overridden, args| {
                    let rel = args.first().and_then(Value::as_str).unwrap_or("");
                    Ok(Value::String(format!("{}{}", assets_base, rel)))
                }),
            );
        }

        let sub_loader = Arc::new(Loader::with_ready_signal(
            LoaderConfig {
                name: name.clone(),
                base_url: base,
                debug: self.config.debug,
                settle_delay_ms: self.config.settle_delay_ms,
            },
            Arc::clone(&self.source),
            Arc::clone(&self.ready),
        ));
        self.packages.lock().insert(name.clone(), sub_loader);

        // Construct only; init stays with the main lifecycle.
        let capability = {
            let mut unit = handle.lock();
            match unit.capability(CONSTRUCT).cloned() {
                Some(cap) => {
                    unit.constructed = true;
                    Some(cap)
                }
                None => {
                    self.sink
                        .log(format!("{} doesn't have construct capability", name));
                    None
                }
            }
        };
        if let Some(capability) = capability {
            capability.invoke(&[json!({ "url": url })])?;
        }

        Ok(handle)
    }

    /// The private sub-loader attached to an executed package.
    pub fn package_loader(&self, name: &str) -> Option<Arc<Loader>> {
        self.packages.lock().get(name).cloned()
    }
}
