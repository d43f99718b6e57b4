// Fetch coordination — tracks requested vs. arrived artifacts and signals the
// lifecycle orchestrator exactly once per cycle when everything has settled.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::config::ABSOLUTE_SCHEME_PREFIX;
use crate::debug::DebugSink;
use crate::errors::{ErrorCollector, ErrorRecord};
use crate::source::traits::ArtifactSource;

use super::lifecycle::LifecycleOrchestrator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestState {
    Pending,
    Completed,
    Errored,
}

struct FetchRequest {
    locator: String,
    state: RequestState,
}

#[derive(Default)]
struct CycleState {
    requests: Vec<FetchRequest>,
    signaled: bool,
}

/// Resolve a locator against `base` unless it already carries the
/// absolute-scheme prefix.
pub(crate) fn resolve_locator(base: &str, locator: &str) -> String {
    if locator.starts_with(ABSOLUTE_SCHEME_PREFIX) {
        locator.to_string()
    } else {
        format!("{}{}", base, locator)
    }
}

/// Issues artifact fetches, dedups by resolved locator, and detects the
/// moment the last outstanding request has arrived (errored requests count
/// as arrived). Every spawned fetch is tagged with the generation current at
/// request time; completions from a stale generation are discarded.
pub struct FetchCoordinator {
    source: Arc<dyn ArtifactSource>,
    orchestrator: Arc<LifecycleOrchestrator>,
    errors: Arc<ErrorCollector>,
    sink: DebugSink,
    base_url: String,
    settle_delay: Duration,
    generation: Arc<AtomicU64>,
    state: Mutex<CycleState>,
}

impl FetchCoordinator {
    pub fn new(
        source: Arc<dyn ArtifactSource>,
        orchestrator: Arc<LifecycleOrchestrator>,
        errors: Arc<ErrorCollector>,
        sink: DebugSink,
        base_url: String,
        settle_delay: Duration,
        generation: Arc<AtomicU64>,
    ) -> Self {
        Self {
            source,
            orchestrator,
            errors,
            sink,
            base_url,
            settle_delay,
            generation,
            state: Mutex::new(CycleState::default()),
        }
    }

    pub(crate) fn resolve(&self, locator: &str) -> String {
        resolve_locator(&self.base_url, locator)
    }

    /// Request a fetch. Returns `false` (a logged no-op) when the resolved
    /// locator is already tracked in this cycle, whatever its state.
    pub fn request(self: &Arc<Self>, locator: &str) -> bool {
        let resolved = self.resolve(locator);
        let generation = self.generation.load(Ordering::SeqCst);

        {
            let mut state = self.state.lock();
            if state.requests.iter().any(|r| r.locator == resolved) {
                self.sink.log(format!("already included: {}", locator));
                return false;
            }
            state.requests.push(FetchRequest {
                locator: resolved.clone(),
                state: RequestState::Pending,
            });
        }

        self.sink.log(format!("including: {}", locator));

        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            let result = coordinator.source.fetch(&resolved).await;

            {
                // Marking and error recording stay under the cycle lock so a
                // concurrent reset either sees this completion fully applied
                // (and flushes it) or not at all.
                let mut state = coordinator.state.lock();
                if coordinator.generation.load(Ordering::SeqCst) != generation {
                    debug!("stale fetch completion for {} ignored", resolved);
                    return;
                }
                if let Some(request) =
                    state.requests.iter_mut().find(|r| r.locator == resolved)
                {
                    request.state = match &result {
                        Ok(_) => RequestState::Completed,
                        Err(_) => RequestState::Errored,
                    };
                }
                if let Err(e) = &result {
                    coordinator.errors.record(ErrorRecord::from_fetch(&resolved, e));
                    coordinator
                        .sink
                        .log(format!("failed to include {}: {}", resolved, e));
                }
            }

            if !coordinator.settle_delay.is_zero() {
                tokio::time::sleep(coordinator.settle_delay).await;
            }

            coordinator.check_complete(generation);
        });

        true
    }

    /// Signal the orchestrator immediately, bypassing the count check. For
    /// pre-bundled code paths where nothing is fetched individually.
    pub fn force_complete(self: &Arc<Self>) {
        let generation = self.generation.load(Ordering::SeqCst);
        {
            let mut state = self.state.lock();
            if state.signaled {
                self.sink.log("completion already signaled this cycle");
                return;
            }
            state.signaled = true;
        }
        self.orchestrator.trigger(generation);
    }

    /// Re-check aggregate completion and signal at most once per cycle.
    fn check_complete(self: &Arc<Self>, generation: u64) {
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }

        let signal = {
            let mut state = self.state.lock();
            if state.signaled
                || state
                    .requests
                    .iter()
                    .any(|r| r.state == RequestState::Pending)
            {
                false
            } else {
                state.signaled = true;
                true
            }
        };

        if signal {
            self.orchestrator.trigger(generation);
        }
    }

    /// Number of requests tracked in the current cycle.
    pub fn request_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    /// Drop all request bookkeeping for a fresh cycle. In-flight fetches are
    /// not cancelled; the generation bump the caller performed makes their
    /// completions stale.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.requests.clear();
        state.signaled = false;
    }
}

#[cfg(test)]
mod tests {
    use super::resolve_locator;

    #[test]
    fn test_resolve_locator() {
        assert_eq!(resolve_locator("/js/", "views/main.js"), "/js/views/main.js");
        assert_eq!(
            resolve_locator("/js/", "http://cdn.example.com/lib.js"),
            "http://cdn.example.com/lib.js"
        );
        assert_eq!(
            resolve_locator("/js/", "https://cdn.example.com/lib.js"),
            "https://cdn.example.com/lib.js"
        );
    }
}
