// Lifecycle state machine — sequences construct, deferred extension
// resolution, and init across all registered units once fetching settles.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::error;

use crate::debug::DebugSink;
use crate::errors::ErrorCollector;

use super::compose::resolve_extension;
use super::registry::UnitRegistry;
use super::unit::{CONSTRUCT, INIT};

/// Callback fired once when a loading cycle completes.
pub type CompleteFn = Box<dyn FnOnce() + Send>;

/// Lifecycle states. `Complete` is terminal until an explicit reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    AwaitingReady,
    Constructing,
    ResolvingExtensions,
    Initializing,
    Complete,
}

/// One-shot host readiness signal. Raised exactly once per process lifetime
/// by the host; waiting after it was raised returns immediately.
pub struct ReadySignal {
    tx: watch::Sender<bool>,
}

impl ReadySignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn raise(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_raised(&self) -> bool {
        *self.tx.borrow()
    }

    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for ReadySignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives every registered unit through construct, extension resolution and
/// init, then fires the completion callback and emits the error report.
///
/// Single-pass and non-reentrant: triggers are accepted only in `Loading`,
/// and only for the current generation. A reset that lands before the pass
/// starts (while awaiting readiness, say) abandons the pass at the next
/// phase boundary; once the pass is running, resets are refused upstream.
pub struct LifecycleOrchestrator {
    registry: Arc<UnitRegistry>,
    ready: Arc<ReadySignal>,
    errors: Arc<ErrorCollector>,
    sink: DebugSink,
    generation: Arc<AtomicU64>,
    phase: Mutex<Phase>,
    pass_active: AtomicBool,
    on_complete: Mutex<Option<CompleteFn>>,
}

impl LifecycleOrchestrator {
    pub fn new(
        registry: Arc<UnitRegistry>,
        ready: Arc<ReadySignal>,
        errors: Arc<ErrorCollector>,
        sink: DebugSink,
        generation: Arc<AtomicU64>,
    ) -> Self {
        Self {
            registry,
            ready,
            errors,
            sink,
            generation,
            phase: Mutex::new(Phase::Loading),
            pass_active: AtomicBool::new(false),
            on_complete: Mutex::new(None),
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase.lock()
    }

    /// Whether a lifecycle pass is currently running between `Constructing`
    /// and `Initializing`. Resets and new triggers are refused in this
    /// window. A pass halted by a unit error is no longer running; the
    /// machine stays in the phase it halted in until an explicit reset.
    pub fn mid_pass(&self) -> bool {
        self.pass_active.load(Ordering::SeqCst)
    }

    /// Store the callback fired when the cycle completes. Replaces any
    /// previously stored callback.
    pub fn set_on_complete(&self, callback: CompleteFn) {
        *self.on_complete.lock() = Some(callback);
    }

    /// Return to `Loading` and drop the stored callback. The caller is
    /// responsible for refusing resets mid-pass.
    pub fn reset(&self) {
        *self.phase.lock() = Phase::Loading;
        *self.on_complete.lock() = None;
    }

    /// Completion signal from the fetch coordinator (natural or forced).
    /// Stale generations and re-entrant triggers are logged and dropped.
    pub fn trigger(self: &Arc<Self>, generation: u64) {
        if self.generation.load(Ordering::SeqCst) != generation {
            self.sink.log("completion signal from a stale cycle ignored");
            return;
        }

        {
            let mut phase = self.phase.lock();
            if *phase != Phase::Loading {
                self.sink
                    .log(format!("completion signal rejected in {:?}", *phase));
                return;
            }
            *phase = Phase::AwaitingReady;
        }

        self.sink.log("downloads complete, waiting for readiness");

        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = orchestrator.run(generation).await {
                error!("lifecycle pass halted: {:#}", e);
            }
        });
    }

    async fn run(self: Arc<Self>, generation: u64) -> Result<()> {
        self.ready.wait().await;

        if !self.advance(generation, Phase::AwaitingReady, Phase::Constructing) {
            return Ok(());
        }

        // Everything past the readiness gate is synchronous.
        self.pass_active.store(true, Ordering::SeqCst);
        let result = self.run_phases(generation);
        self.pass_active.store(false, Ordering::SeqCst);
        result
    }

    fn run_phases(&self, generation: u64) -> Result<()> {
        self.apply_phase(CONSTRUCT)?;

        if !self.advance(generation, Phase::Constructing, Phase::ResolvingExtensions) {
            return Ok(());
        }
        self.resolve_deferred();

        if !self.advance(generation, Phase::ResolvingExtensions, Phase::Initializing) {
            return Ok(());
        }
        self.apply_phase(INIT)?;

        if !self.advance(generation, Phase::Initializing, Phase::Complete) {
            return Ok(());
        }

        if let Some(callback) = self.on_complete.lock().take() {
            callback();
        }

        self.sink.log("unit construct/extend/init completed");

        if !self.errors.is_empty() {
            self.sink.log(self.errors.report());
        }

        Ok(())
    }

    /// Move `from` to `to` unless the cycle was reset underneath the pass.
    fn advance(&self, generation: u64, from: Phase, to: Phase) -> bool {
        if self.generation.load(Ordering::SeqCst) != generation {
            self.sink.log("lifecycle pass abandoned: cycle was reset");
            return false;
        }

        let mut phase = self.phase.lock();
        if *phase != from {
            self.sink
                .log(format!("expected {:?} but found {:?}, abandoning pass", from, *phase));
            return false;
        }
        *phase = to;
        true
    }

    /// Invoke `capability` on every unit in registration order. Units
    /// lacking it are logged and skipped; units that already ran it this
    /// cycle are skipped. A call failure propagates and halts the pass.
    fn apply_phase(&self, capability: &str) -> Result<()> {
        // Walk by index against the live registry: a construct call may
        // register further units, and those must be visited too.
        let mut index = 0;
        while let Some(handle) = self.registry.unit_at(index) {
            index += 1;
            let (name, cap) = {
                let mut unit = handle.lock();

                let already = if capability == CONSTRUCT {
                    unit.constructed
                } else {
                    unit.initialized
                };
                if already {
                    continue;
                }

                let Some(cap) = unit.capability(capability) else {
                    self.sink
                        .log(format!("{} doesn't have {} capability", unit.name, capability));
                    continue;
                };
                let cap = cap.clone();

                if capability == CONSTRUCT {
                    unit.constructed = true;
                } else {
                    unit.initialized = true;
                }
                (unit.name.clone(), cap)
            };

            self.sink.log(format!("{}.{}", name, capability));
            // Lock released: the call may register units or request fetches.
            cap.invoke(&[])?;
        }
        Ok(())
    }

    /// Apply every parked extension declaration whose target is registered,
    /// replacing the target binding with the composed descriptor.
    fn resolve_deferred(&self) {
        for declaration in self.registry.take_deferred() {
            if self.registry.lookup(&declaration.target).is_none() {
                self.sink.log(format!(
                    "deferred extension target [{}] never registered",
                    declaration.target
                ));
                continue;
            }
            resolve_extension(
                &self.sink,
                &self.registry,
                &declaration.target,
                &declaration.source,
            );
        }
    }
}
