// Fixed-interval action gate — suppresses repeats of a named action until its
// interval has elapsed.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

struct GateEntry {
    interval: Duration,
    last_fired: Option<Instant>,
}

/// Named rate gates. Each action name carries its own interval, so one gate
/// can police several unrelated action streams at once.
#[derive(Default)]
pub struct DelayGate {
    entries: Mutex<HashMap<String, GateEntry>>,
}

impl DelayGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `action` with a minimum interval between firings.
    /// Re-adding an action replaces its interval and clears its history.
    pub fn add(&self, action: &str, interval: Duration) {
        self.entries.lock().insert(
            action.to_string(),
            GateEntry {
                interval,
                last_fired: None,
            },
        );
    }

    pub fn remove(&self, action: &str) {
        self.entries.lock().remove(action);
    }

    /// Whether `action` may fire now. A firing is recorded on success.
    /// Unregistered actions always fire.
    pub fn check(&self, action: &str) -> bool {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(action) else {
            return true;
        };

        let now = Instant::now();
        match entry.last_fired {
            Some(last) if now.duration_since(last) < entry.interval => false,
            _ => {
                entry.last_fired = Some(now);
                true
            }
        }
    }
}
