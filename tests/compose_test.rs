// Integration tests for runtime composition: capability chaining, delegate
// access to overridden implementations, variadic forwarding and data merges.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Value};

use artifact_loader::config::LoaderConfig;
use artifact_loader::debug::DebugMode;
use artifact_loader::engine::registry::ExtensionMode;
use artifact_loader::engine::unit::UnitDescriptor;
use artifact_loader::loader::Loader;
use artifact_loader::source::traits::{ArtifactSource, FetchError};

struct NullSource;

#[async_trait]
impl ArtifactSource for NullSource {
    async fn fetch(&self, _url: &str) -> Result<Bytes, FetchError> {
        Ok(Bytes::from_static(b""))
    }
}

fn test_loader() -> Loader {
    Loader::new(
        LoaderConfig {
            name: "test".to_string(),
            debug: DebugMode::Off,
            ..LoaderConfig::default()
        },
        Arc::new(NullSource),
    )
}

#[test]
fn test_missing_capability_is_copied_verbatim() {
    let loader = test_loader();
    loader.register(UnitDescriptor::instantiable("A"));
    loader.register(
        UnitDescriptor::instantiable("B").with_capability("foo", |_, _| Ok(json!("b-foo"))),
    );

    let composed = loader.extend("A", "B", ExtensionMode::Immediate).unwrap();
    let foo = composed.lock().capability("foo").unwrap().clone();

    // Behaves identically to B's own foo.
    assert_eq!(foo.invoke(&[]).unwrap(), json!("b-foo"));
}

#[test]
fn test_shared_capability_layers_with_delegate_access() {
    let loader = test_loader();
    loader.register(UnitDescriptor::instantiable("A").with_capability(
        "foo",
        |overridden, args| {
            let below = overridden.call(args)?;
            Ok(json!(format!("a({})", below.as_str().unwrap())))
        },
    ));
    loader.register(
        UnitDescriptor::instantiable("B").with_capability("foo", |overridden, _| {
            assert!(!overridden.exists());
            Ok(json!("b"))
        }),
    );

    let composed = loader.extend("A", "B", ExtensionMode::Immediate).unwrap();
    let foo = composed.lock().capability("foo").unwrap().clone();

    // A's implementation runs first and reaches B's only via the delegate.
    assert_eq!(foo.depth(), 2);
    assert_eq!(foo.invoke(&[]).unwrap(), json!("a(b)"));
}

#[test]
fn test_argument_forwarding_is_fully_variadic() {
    let loader = test_loader();
    loader.register(UnitDescriptor::instantiable("A").with_capability(
        "sum",
        |overridden, args| overridden.call(args),
    ));
    loader.register(UnitDescriptor::instantiable("B").with_capability(
        "sum",
        |_, args| {
            let total: i64 = args.iter().filter_map(Value::as_i64).sum();
            Ok(json!(total))
        },
    ));

    let composed = loader.extend("A", "B", ExtensionMode::Immediate).unwrap();
    let sum = composed.lock().capability("sum").unwrap().clone();

    // Eight arguments: well past the original six-argument ceiling.
    let args: Vec<Value> = (1..=8).map(|n| json!(n)).collect();
    assert_eq!(sum.invoke(&args).unwrap(), json!(36));
}

#[test]
fn test_data_source_merges_fields_shallowly() {
    let loader = test_loader();
    loader.register(
        UnitDescriptor::instantiable("Widget")
            .with_field("width", json!(300))
            .with_capability("draw", |_, _| Ok(json!("drawn"))),
    );
    loader.register(
        UnitDescriptor::data("Defaults")
            .with_field("width", json!(100))
            .with_field("theme", json!("dark")),
    );

    let composed = loader
        .extend("Widget", "Defaults", ExtensionMode::Immediate)
        .unwrap();
    let composed = composed.lock();

    // Target's own fields win ties; missing fields are copied.
    assert_eq!(composed.field("width"), Some(&json!(300)));
    assert_eq!(composed.field("theme"), Some(&json!("dark")));
    assert_eq!(composed.name, "Widget");
    assert!(composed.has_capability("draw"));
}

#[test]
fn test_composed_descriptor_replaces_the_binding_in_place() {
    let loader = test_loader();
    let original = loader.register(UnitDescriptor::instantiable("A"));
    loader.register(
        UnitDescriptor::instantiable("B").with_capability("foo", |_, _| Ok(json!("b"))),
    );

    let composed = loader.extend("A", "B", ExtensionMode::Immediate).unwrap();

    assert!(!Arc::ptr_eq(&composed, &original));
    let bound = loader.registry().lookup("A").unwrap();
    assert!(Arc::ptr_eq(&bound, &composed));
    // Replaced, never duplicated: still two registry slots.
    assert_eq!(loader.registry().len(), 2);
}

#[test]
fn test_unresolvable_source_degrades_to_unmodified_target() {
    let loader = test_loader();
    let target = loader.register(UnitDescriptor::instantiable("A"));

    let out = loader
        .extend("A", "NoSuchUnit", ExtensionMode::Immediate)
        .unwrap();
    assert!(Arc::ptr_eq(&out, &target));

    // Deferred-static with an absent source parks the declaration and also
    // returns the unmodified target.
    let out = loader
        .extend("A", "StillMissing", ExtensionMode::DeferredStatic)
        .unwrap();
    assert!(Arc::ptr_eq(&out, &target));
}

#[test]
fn test_missing_target_yields_none() {
    let loader = test_loader();
    loader.register(UnitDescriptor::instantiable("B"));
    assert!(loader.extend("NoSuchUnit", "B", ExtensionMode::Immediate).is_none());
}
