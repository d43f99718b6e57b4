//! Asynchronous artifact loader and unit lifecycle engine.
//!
//! A loader fetches a set of named code artifacts, detects when all of them
//! have arrived, then drives every registered unit through three ordered
//! activation phases: construct, extend, init. Units compose at runtime:
//! one unit's capabilities merge into another's with delegate access to the
//! overridden implementation.

pub mod config;
pub mod debug;
pub mod delay;
pub mod engine;
pub mod errors;
pub mod loader;
pub mod source;

pub use config::LoaderConfig;
pub use debug::DebugMode;
pub use engine::lifecycle::{Phase, ReadySignal};
pub use engine::registry::ExtensionMode;
pub use engine::unit::{Capability, Delegate, UnitDescriptor, UnitHandle, UnitKind};
pub use loader::Loader;
