//! Loading the demo adapter as a shared library through `libloading`.
//!
//! The `daq-adapter-demo` cdylib is built alongside the test binaries. It is
//! copied into a scratch directory under the platform file name for module
//! `demo`, so discovery sees nothing else.

use daq_adapters::prelude::*;
use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Built demo cdylib next to this test binary, if cargo produced one.
fn built_demo_library() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let deps = exe.parent()?;
    let lead = format!("{}daq_adapter_demo", DLL_PREFIX);

    let found = [Some(deps), deps.parent()]
        .into_iter()
        .flatten()
        .filter_map(|dir| std::fs::read_dir(dir).ok())
        .flat_map(|entries| entries.filter_map(Result::ok))
        .map(|entry| entry.path())
        .find(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(&lead) && n.ends_with(DLL_SUFFIX))
        });
    found
}

/// Loader over a scratch directory holding the demo library as `demo`.
fn demo_loader(dir: &Path) -> Option<NativeModuleLoader> {
    let Some(built) = built_demo_library() else {
        eprintln!("daq-adapter-demo cdylib not found next to the test binary, skipping");
        return None;
    };
    let loader = NativeModuleLoader::new([dir]);
    std::fs::copy(&built, dir.join(loader.file_name("demo"))).unwrap();
    Some(loader)
}

// =============================================================================
// Native Modules
// =============================================================================

#[test]
fn test_demo_library_is_discovered_and_enumerated() {
    let dir = tempfile::tempdir().unwrap();
    let Some(loader) = demo_loader(dir.path()) else {
        return;
    };
    let registry = ModuleRegistry::new(loader);

    assert_eq!(registry.available_modules(), vec!["demo".to_string()]);
    let module = registry.get_or_load("demo").unwrap();
    assert!(module.path().unwrap().starts_with(dir.path()));

    let names: Vec<&str> = module
        .advertised_devices()
        .iter()
        .map(|d| d.name.as_str())
        .collect();
    assert_eq!(
        names,
        vec!["DWheel", "DShutter", "DStage", "DXYStage", "DCamera", "DHub", "DObjective", "DDac"]
    );
    assert_eq!(
        module.advertised_device_type("DWheel").unwrap(),
        DeviceCategory::State
    );
}

#[test]
fn test_native_wheel_moves_and_library_is_released() {
    let dir = tempfile::tempdir().unwrap();
    let Some(loader) = demo_loader(dir.path()) else {
        return;
    };
    let registry = ModuleRegistry::new(loader);

    let module = registry.get_or_load("demo").unwrap();
    let weak = Arc::downgrade(&module);
    let device = module
        .create_device(
            ControllerRef::detached(),
            "DWheel",
            "Emission",
            DeviceLoggers::for_label("Emission"),
        )
        .unwrap();
    drop(module);

    let wheel = device.as_state().unwrap();
    wheel.set_position(3).unwrap();
    assert_eq!(wheel.get_position().unwrap(), 3);
    assert_eq!(
        device.property_names().unwrap(),
        vec!["Position", "Label", "Description"]
    );
    assert_eq!(device.get_property("Label").unwrap(), "TRITC");

    assert!(registry.unload("demo"));
    assert!(weak.upgrade().is_some());

    drop(device);
    assert!(weak.upgrade().is_none());
    assert!(!registry.is_loaded("demo"));
}

#[test]
fn test_native_driver_errors_cross_the_boundary() {
    let dir = tempfile::tempdir().unwrap();
    let Some(loader) = demo_loader(dir.path()) else {
        return;
    };
    let registry = ModuleRegistry::new(loader);
    let device = registry
        .get_or_load("demo")
        .unwrap()
        .create_device(
            ControllerRef::detached(),
            "DShutter",
            "Shutter",
            DeviceLoggers::disabled(),
        )
        .unwrap();

    device.set_property("Interlock", "Engaged").unwrap();
    match device.as_shutter().unwrap().set_open(true) {
        Err(AdapterError::DeviceCommunication { message, .. }) => {
            assert_eq!(message, "Interlock engaged");
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(matches!(
        device.get_property("Speed"),
        Err(AdapterError::PropertyNotFound { .. })
    ));
}
