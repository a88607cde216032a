//! Category operations against the demo adapter, linked statically.

mod common;

use common::{create, registry};
use daq_adapters::prelude::*;

#[test]
fn test_demo_module_advertises_every_device_it_builds() {
    let registry = registry();
    let module = registry.get_or_load("demo").unwrap();

    for advertised in module.advertised_devices() {
        let device = create(&registry, "demo", &advertised.name, &advertised.name).unwrap();
        assert_eq!(device.category(), advertised.category);
        device.initialize().unwrap();
        device.shutdown().unwrap();
    }
}

#[test]
fn test_demo_wheel_label_follows_position() {
    let registry = registry();
    let device = create(&registry, "demo", "DWheel", "Emission").unwrap();
    let wheel = device.as_state().unwrap();

    assert_eq!(wheel.number_of_positions(), 6);
    wheel.set_position(3).unwrap();
    assert_eq!(device.get_property("Label").unwrap(), "TRITC");

    device.set_property("Label", "DAPI").unwrap();
    assert_eq!(wheel.get_position().unwrap(), 1);
    assert!(matches!(
        wheel.set_position(6),
        Err(AdapterError::InvalidValue { .. })
    ));
}

#[test]
fn test_shutter_interlock_surfaces_driver_text() {
    let registry = registry();
    let shutter = create(&registry, "demo", "DShutter", "Shutter")
        .unwrap()
        .into_shutter()
        .unwrap();

    shutter.set_open(true).unwrap();
    assert!(shutter.is_open().unwrap());
    assert_eq!(shutter.get_property("State").unwrap(), "1");
    shutter.set_open(false).unwrap();

    shutter.set_property("Interlock", "Engaged").unwrap();
    match shutter.set_open(true) {
        Err(AdapterError::DeviceCommunication { message, .. }) => {
            assert_eq!(message, "Interlock engaged");
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(!shutter.is_open().unwrap());
}

#[test]
fn test_stage_moves_and_rezeroes() {
    let registry = registry();
    let stage = create(&registry, "demo", "DStage", "Z")
        .unwrap()
        .into_stage()
        .unwrap();

    stage.set_position_um(250.0).unwrap();
    stage.set_relative_position_um(-50.0).unwrap();
    assert_eq!(stage.position_um().unwrap(), 200.0);

    stage.set_origin().unwrap();
    assert_eq!(stage.position_um().unwrap(), 0.0);
    stage.home().unwrap();
    assert!(stage.set_position_um(1e6).is_err());
}

#[test]
fn test_xy_stage_reports_both_axes() {
    let registry = registry();
    let stage = create(&registry, "demo", "DXYStage", "XY")
        .unwrap()
        .into_xy_stage()
        .unwrap();

    stage.set_position_um(1200.0, 800.0).unwrap();
    assert_eq!(stage.position_um().unwrap(), (1200.0, 800.0));
    assert!(stage.set_position_um(-1.0, 0.0).is_err());
    assert_eq!(stage.position_um().unwrap(), (1200.0, 800.0));
    // Origin is fixed on this stage.
    assert!(stage.set_origin().is_err());
}

#[test]
fn test_camera_snaps_frame_of_reported_size() {
    let registry = registry();
    let camera = create(&registry, "demo", "DCamera", "Camera")
        .unwrap()
        .into_camera()
        .unwrap();

    camera.set_exposure_ms(25.0).unwrap();
    assert_eq!(camera.exposure_ms(), 25.0);
    assert_eq!(camera.get_property("Exposure").unwrap(), "25");

    camera.snap_image().unwrap();
    let frame = camera.image_buffer().unwrap();
    let expected = camera.image_width() * camera.image_height() * camera.bytes_per_pixel();
    assert_eq!(frame.len(), expected as usize);

    camera.set_binning(2).unwrap();
    assert_eq!(camera.binning(), 2);
    camera.snap_image().unwrap();
    assert_eq!(
        camera.image_buffer().unwrap().len(),
        expected as usize / 4
    );
}

#[test]
fn test_hub_detects_peripherals() {
    let registry = registry();
    let device = create(&registry, "demo", "DHub", "Hub").unwrap();
    let hub = device.as_hub().unwrap();

    assert!(hub.installed_devices().unwrap().is_empty());
    hub.detect_installed_devices().unwrap();
    let installed = hub.installed_devices().unwrap();
    assert!(installed.contains(&"DWheel".to_string()));
    assert!(!installed.contains(&"DHub".to_string()));
}

#[test]
fn test_magnifier_follows_property() {
    let registry = registry();
    let device = create(&registry, "demo", "DObjective", "Objective").unwrap();
    let objective = device.as_magnifier().unwrap();

    assert_eq!(objective.magnification(), 10.0);
    device.set_property("Magnification", "63").unwrap();
    assert_eq!(objective.magnification(), 63.0);
}

#[test]
fn test_signal_io_range_and_gate() {
    let registry = registry();
    let dac = create(&registry, "demo", "DDac", "Dac")
        .unwrap()
        .into_signal_io()
        .unwrap();

    assert_eq!(dac.limits().unwrap(), (0.0, 10.0));
    dac.set_signal(3.3).unwrap();
    assert_eq!(dac.signal().unwrap(), 3.3);
    dac.set_gate_open(false).unwrap();
    assert!(!dac.gate_open().unwrap());
    assert_eq!(dac.signal().unwrap(), 0.0);
    assert!(dac.set_signal(11.0).is_err());
}

#[test]
fn test_typed_accessors_refuse_other_categories() {
    let registry = registry();
    let device = create(&registry, "demo", "DCamera", "Camera").unwrap();

    assert!(device.as_stage().is_none());
    let device = device.into_shutter().unwrap_err();
    assert!(device.as_camera().is_some());
}
