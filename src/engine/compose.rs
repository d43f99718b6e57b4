// Extension engine — merges one unit's capabilities into another, layering
// same-named implementations into delegation chains.

use std::sync::Arc;

use crate::debug::DebugSink;

use super::registry::UnitRegistry;
use super::unit::{UnitDescriptor, UnitHandle, UnitKind};

/// Merge `source` into `target`, producing the composed descriptor.
///
/// For an instantiable source, every source capability either layers under
/// the target's same-named capability (the target implementation stays
/// most-derived and reaches the source's original through its delegate) or
/// is copied when the target lacks it. For a data source, fields merge
/// shallowly instead. Either way the target's own members win ties, and the
/// composed descriptor keeps the target's name, kind and phase flags.
pub(crate) fn merge(sink: &DebugSink, target: &UnitHandle, source: &UnitHandle) -> UnitHandle {
    // Self-composition would deadlock on the second lock; a single snapshot
    // serves as both sides.
    let source_snapshot = if Arc::ptr_eq(target, source) {
        target.lock().clone()
    } else {
        source.lock().clone()
    };

    let mut composed = target.lock().clone();

    match source_snapshot.kind {
        UnitKind::Instantiable => {
            for (name, source_cap) in source_snapshot.capabilities() {
                let layered = match composed.capability(name).cloned() {
                    Some(mut existing) => {
                        existing.layer_over(source_cap);
                        existing
                    }
                    None => source_cap.clone(),
                };
                composed.set_capability(name.clone(), layered);
            }
            merge_fields(&mut composed, &source_snapshot);
            sink.log(format!(
                "extending {} with {}",
                composed.name, source_snapshot.name
            ));
        }
        UnitKind::Data => {
            merge_fields(&mut composed, &source_snapshot);
            sink.log(format!(
                "extending {} with data unit {}",
                composed.name, source_snapshot.name
            ));
        }
    }

    let hook = composed.identity_hook.clone();
    let handle = composed.into_handle();
    if let Some(hook) = hook {
        hook(&handle);
    }
    handle
}

/// Copy source fields the target does not already define.
fn merge_fields(composed: &mut UnitDescriptor, source: &UnitDescriptor) {
    for (name, value) in source.fields() {
        if composed.field(name).is_none() {
            composed.set_field(name.clone(), value.clone());
        }
    }
}

/// Resolve an extension right now: look up both units, merge, and replace
/// the target's registry slot and binding with the composed result.
///
/// A missing target is a no-op (`None`); a missing source degrades to the
/// unmodified target. Neither is fatal.
pub(crate) fn resolve_extension(
    sink: &DebugSink,
    registry: &UnitRegistry,
    target_name: &str,
    source_name: &str,
) -> Option<UnitHandle> {
    let Some(target) = registry.lookup(target_name) else {
        sink.log(format!(
            "extension target [{}] is not registered",
            target_name
        ));
        return None;
    };

    let Some(source) = registry.lookup(source_name) else {
        sink.log(format!(
            "extension source [{}] cannot be resolved via@{}",
            source_name, target_name
        ));
        return Some(target);
    };

    let composed = merge(sink, &target, &source);
    registry.replace(target_name, &target, composed.clone());
    Some(composed)
}
