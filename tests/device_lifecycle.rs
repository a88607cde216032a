//! Device construction, ownership of raw handles and the property protocol.

mod common;

use common::{create, registry, Wheel, BENCH};
use daq_adapter_api::abi::status;
use daq_adapters::prelude::*;
use serial_test::serial;
use std::sync::Arc;

// =============================================================================
// Construction
// =============================================================================

#[test]
#[serial]
fn test_wheel_is_constructed_as_state_device() {
    BENCH.reset();
    let registry = registry();
    let device = create(&registry, "bench", "Wheel", "Emission").unwrap();

    assert_eq!(device.label(), "Emission");
    assert_eq!(device.category(), DeviceCategory::State);
    assert_eq!(device.instance().name(), "Wheel");
    assert_eq!(device.instance().description(), "Four-position test wheel");
    assert!(device.has_property("Position"));
    assert!(!device.has_property("Speed"));

    let wheel = device.as_state().unwrap();
    assert_eq!(wheel.number_of_positions(), Wheel::POSITIONS);
    wheel.set_position(3).unwrap();
    assert_eq!(wheel.get_position().unwrap(), 3);
    assert_eq!(device.get_property("Position").unwrap(), "3");
    assert!(device.as_camera().is_none());
}

#[test]
#[serial]
fn test_unadvertised_device_never_reaches_factory() {
    BENCH.reset();
    let registry = registry();

    let err = create(&registry, "bench", "Laser", "Laser").unwrap_err();

    assert!(matches!(err, AdapterError::DeviceNotFound { ref device, .. } if device == "Laser"));
    assert_eq!(BENCH.created(), 0);
    assert_eq!(BENCH.deleted(), 0);
}

#[test]
#[serial]
fn test_factory_refusal_is_creation_error_without_delete() {
    BENCH.reset();
    let registry = registry();

    let err = create(&registry, "bench", "Ghost", "Ghost").unwrap_err();

    assert!(matches!(err, AdapterError::DeviceCreation { .. }));
    assert_eq!(BENCH.deleted(), 0);
}

#[test]
#[serial]
fn test_invalid_label_deletes_handle_once() {
    for label in ["", " padded", "tab\there"] {
        BENCH.reset();
        let registry = registry();

        let err = create(&registry, "bench", "Wheel", label).unwrap_err();

        assert!(matches!(err, AdapterError::InvalidLabel { .. }), "{:?}", label);
        assert_eq!(BENCH.created(), 1);
        assert_eq!(BENCH.deleted(), 1);
    }
}

#[test]
#[serial]
fn test_category_mismatch_deletes_handle_once() {
    BENCH.reset();
    let registry = registry();

    let err = create(&registry, "bench", "Impostor", "Impostor").unwrap_err();

    match err {
        AdapterError::DeviceCreation { device, reason, .. } => {
            assert_eq!(device, "Impostor");
            assert!(reason.contains("Shutter"), "{}", reason);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(BENCH.deleted(), 1);
}

#[test]
#[serial]
fn test_missing_interface_deletes_handle_once() {
    BENCH.reset();
    let registry = registry();

    let err = create(&registry, "bench", "Hollow", "Hollow").unwrap_err();

    assert!(matches!(err, AdapterError::DeviceCreation { .. }));
    assert_eq!(BENCH.created(), 1);
    assert_eq!(BENCH.deleted(), 1);
}

#[test]
#[serial]
fn test_drop_deletes_handle_once() {
    BENCH.reset();
    let registry = registry();
    let device = create(&registry, "bench", "Wheel", "Wheel").unwrap();
    assert_eq!(BENCH.deleted(), 0);

    drop(device);
    assert_eq!(BENCH.deleted(), 1);
    drop(registry);
    assert_eq!(BENCH.deleted(), 1);
}

// =============================================================================
// Property Protocol
// =============================================================================

#[test]
#[serial]
fn test_property_names_are_stable() {
    let registry = registry();
    let device = create(&registry, "bench", "Wheel", "Wheel").unwrap();

    let first = device.property_names().unwrap();
    assert_eq!(first, vec!["Position", "Fault", "Serial"]);
    assert_eq!(device.property_names().unwrap(), first);
}

#[test]
#[serial]
fn test_rejected_value_keeps_old_value() {
    let registry = registry();
    let device = create(&registry, "bench", "Wheel", "Wheel").unwrap();
    device.set_property("Fault", "None").unwrap();

    let err = device.set_property("Fault", "Melted").unwrap_err();
    match err {
        AdapterError::InvalidValue {
            label,
            property,
            value,
            ..
        } => {
            assert_eq!(label, "Wheel");
            assert_eq!(property, "Fault");
            assert_eq!(value, "Melted");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(device.get_property("Fault").unwrap(), "None");
}

#[test]
#[serial]
fn test_out_of_range_position_is_invalid_value() {
    let registry = registry();
    let wheel = create(&registry, "bench", "Wheel", "Wheel")
        .unwrap()
        .into_state()
        .unwrap();
    wheel.set_position(1).unwrap();

    let err = wheel.set_position(7).unwrap_err();
    assert!(matches!(err, AdapterError::InvalidValue { .. }), "{:?}", err);
    assert_eq!(wheel.get_position().unwrap(), 1);
}

#[test]
#[serial]
fn test_rejected_position_is_reported_exactly() {
    let registry = registry();
    let wheel = create(&registry, "bench", "Wheel", "Wheel")
        .unwrap()
        .into_state()
        .unwrap();

    match wheel.set_position(i64::MAX).unwrap_err() {
        AdapterError::InvalidValue {
            property, value, ..
        } => {
            assert_eq!(property, "set_position");
            assert_eq!(value, "9223372036854775807");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(wheel.get_position().unwrap(), 0);
}

#[test]
#[serial]
fn test_oversized_camera_frame_is_communication_error() {
    BENCH.reset();
    let registry = registry();
    let camera = create(&registry, "bench", "Giant", "Giant")
        .unwrap()
        .into_camera()
        .unwrap();
    camera.snap_image().unwrap();

    let err = camera.image_buffer().unwrap_err();
    match err {
        AdapterError::DeviceCommunication { label, code, message } => {
            assert_eq!(label, "Giant");
            assert_eq!(code, status::ERR);
            assert!(message.contains("too large"), "{}", message);
        }
        other => panic!("unexpected error: {:?}", other),
    }

    drop(camera);
    assert_eq!(BENCH.deleted(), 1);
}

#[test]
#[serial]
fn test_unknown_property_is_not_found() {
    let registry = registry();
    let device = create(&registry, "bench", "Wheel", "Wheel").unwrap();

    assert!(matches!(
        device.get_property("Speed"),
        Err(AdapterError::PropertyNotFound { ref property, .. }) if property == "Speed"
    ));
    assert!(matches!(
        device.set_property("Speed", "1"),
        Err(AdapterError::PropertyNotFound { .. })
    ));
}

#[test]
#[serial]
fn test_driver_failure_carries_code_and_text() {
    let registry = registry();
    let device = create(&registry, "bench", "Wheel", "Wheel").unwrap();
    device.set_property("Fault", "Jammed").unwrap();

    let err = device.as_state().unwrap().set_position(2).unwrap_err();
    assert_eq!(
        err,
        AdapterError::DeviceCommunication {
            label: "Wheel".to_string(),
            code: status::DRIVER_SPECIFIC,
            message: "Wheel jammed".to_string(),
        }
    );
    assert_eq!(err.status_code(), Some(status::DRIVER_SPECIFIC));

    let err = device.as_state().unwrap().set_gate_open(false).unwrap_err();
    assert_eq!(err.status_code(), Some(status::UNSUPPORTED_COMMAND));
}

#[test]
#[serial]
fn test_read_only_property_rejects_writes() {
    let registry = registry();
    let device = create(&registry, "bench", "Wheel", "Wheel").unwrap();

    assert!(device.instance().is_property_read_only("Serial").unwrap());
    assert!(!device.instance().is_property_read_only("Position").unwrap());
    let err = device.set_property("Serial", "W-9999").unwrap_err();
    assert_eq!(err.status_code(), Some(status::READ_ONLY_PROPERTY));
    assert_eq!(device.get_property("Serial").unwrap(), "W-0001");
}

#[test]
#[serial]
fn test_allowed_values_are_reported() {
    let registry = registry();
    let device = create(&registry, "bench", "Wheel", "Wheel").unwrap();

    assert_eq!(
        device.instance().allowed_property_values("Fault").unwrap(),
        vec!["None", "Jammed"]
    );
    assert!(device
        .instance()
        .allowed_property_values("Position")
        .unwrap()
        .is_empty());
}

// =============================================================================
// Controller Reference
// =============================================================================

struct Scope {
    labels: Vec<String>,
}

impl Controller for Scope {
    fn device_labels(&self) -> Vec<String> {
        self.labels.clone()
    }

    fn parent_label(&self, label: &str) -> Option<String> {
        (label == "Emission").then(|| "Hub".to_string())
    }
}

#[test]
#[serial]
fn test_controller_reference_reports_absence_after_drop() {
    let registry = registry();
    let controller: Arc<dyn Controller> = Arc::new(Scope {
        labels: vec!["Emission".to_string()],
    });

    let device = registry
        .get_or_load("bench")
        .unwrap()
        .create_device(
            ControllerRef::new(&controller),
            "Wheel",
            "Emission",
            DeviceLoggers::disabled(),
        )
        .unwrap();

    assert!(device.controller().is_alive());
    assert_eq!(
        device.controller().query(|c| c.parent_label(device.label())),
        Some(Some("Hub".to_string()))
    );

    drop(controller);
    assert!(!device.controller().is_alive());
    assert_eq!(device.controller().query(|c| c.device_labels()), None);

    // The device itself keeps working.
    device.as_state().unwrap().set_position(1).unwrap();
}

#[test]
#[serial]
fn test_device_keeps_module_alive() {
    let registry = registry();
    let device = create(&registry, "bench", "Wheel", "Wheel").unwrap();
    let module = registry.get_or_load("bench").unwrap();

    assert!(Arc::ptr_eq(&device.adapter_module(), &module));
    assert_eq!(device.adapter_module().name(), "bench");
}

#[test]
#[serial]
fn test_devices_are_usable_across_threads() {
    let registry = registry();
    let wheel = Arc::new(
        create(&registry, "bench", "Wheel", "Wheel")
            .unwrap()
            .into_state()
            .unwrap(),
    );

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let wheel = Arc::clone(&wheel);
            std::thread::spawn(move || {
                for _ in 0..25 {
                    wheel.set_position(i % 4).unwrap();
                    let position = wheel.get_position().unwrap();
                    assert!((0..4).contains(&position));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}
