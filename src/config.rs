use serde::Deserialize;

use crate::debug::DebugMode;

/// Scheme prefix that marks a locator as absolute; such locators are used
/// unmodified instead of being joined onto the configured base.
pub const ABSOLUTE_SCHEME_PREFIX: &str = "http";

/// Default wait after each individual fetch completion before the aggregate
/// completion re-check. Zero: completion marking already happens after the
/// artifact has executed, so there is no registration race to absorb.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 0;

/// Loader name used when none is configured.
pub const DEFAULT_LOADER_NAME: &str = "loader";

/// Subdirectory appended to a package's base path for its asset URLs.
pub const PACKAGE_ASSETS_DIR: &str = "assets/";

/// Per-instance configuration for a loader.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Identity reported by the debug sink.
    pub name: String,
    /// Base joined in front of every relative locator.
    pub base_url: String,
    /// Where diagnostics go.
    pub debug: DebugMode,
    /// Wait after each fetch completion before re-checking aggregate
    /// completion, in milliseconds.
    pub settle_delay_ms: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_LOADER_NAME.to_string(),
            base_url: String::new(),
            debug: DebugMode::Structured,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = LoaderConfig::default();
        assert_eq!(cfg.name, "loader");
        assert_eq!(cfg.base_url, "");
        assert_eq!(cfg.debug, DebugMode::Structured);
        assert_eq!(cfg.settle_delay_ms, 0);
    }

    #[test]
    fn test_deserialize_partial() {
        let cfg: LoaderConfig =
            serde_json::from_str(r#"{"name":"site","base_url":"/js/","debug":"plain"}"#).unwrap();
        assert_eq!(cfg.name, "site");
        assert_eq!(cfg.base_url, "/js/");
        assert_eq!(cfg.debug, DebugMode::Plain);
        assert_eq!(cfg.settle_delay_ms, 0);
    }
}
