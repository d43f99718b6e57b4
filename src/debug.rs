// Configurable diagnostic sink — structured tracing, plain stdout, or silent.

use std::fmt::Display;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

/// Where loader diagnostics are routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebugMode {
    /// Route through `tracing` with the loader identity as a field.
    #[default]
    Structured,
    /// Write directly to stdout.
    Plain,
    /// Discard everything.
    Off,
}

/// Per-loader diagnostic sink. Cheap to clone; every message carries the
/// owning loader's identity.
#[derive(Debug, Clone)]
pub struct DebugSink {
    name: Arc<str>,
    mode: DebugMode,
}

impl DebugSink {
    pub fn new(name: &str, mode: DebugMode) -> Self {
        Self {
            name: Arc::from(name),
            mode,
        }
    }

    /// The loader identity this sink reports as.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn log(&self, message: impl Display) {
        match self.mode {
            DebugMode::Structured => debug!(loader = %self.name, "{}", message),
            DebugMode::Plain => println!("[{}] {}", self.name, message),
            DebugMode::Off => {}
        }
    }
}
