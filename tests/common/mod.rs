//! Adapters linked into the test binaries.
//!
//! Each adapter counts module initializations, device creations and device
//! deletions so tests can check ownership of raw handles.

#![allow(dead_code)]

use daq_adapter_api::prelude::*;
use daq_adapters::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counters shared by one adapter type.
pub struct Counters {
    pub initialized: AtomicUsize,
    pub created: AtomicUsize,
    pub deleted: AtomicUsize,
}

impl Counters {
    pub const fn new() -> Self {
        Self {
            initialized: AtomicUsize::new(0),
            created: AtomicUsize::new(0),
            deleted: AtomicUsize::new(0),
        }
    }

    pub fn reset(&self) {
        self.initialized.store(0, Ordering::SeqCst);
        self.created.store(0, Ordering::SeqCst);
        self.deleted.store(0, Ordering::SeqCst);
    }

    pub fn initialized(&self) -> usize {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> usize {
        self.deleted.load(Ordering::SeqCst)
    }
}

pub static BENCH: Counters = Counters::new();

/// Increments `deleted` when the host deletes the device.
pub struct DropCounter(&'static Counters);

impl DropCounter {
    fn new(counters: &'static Counters) -> Self {
        counters.created.fetch_add(1, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.deleted.fetch_add(1, Ordering::SeqCst);
    }
}

// =============================================================================
// Wheel
// =============================================================================

/// Four-position wheel. `Fault` is a property that makes every move fail
/// with a driver-specific error.
pub struct Wheel {
    props: PropertyTable,
    position: i64,
    _counter: DropCounter,
}

impl Wheel {
    pub const POSITIONS: u64 = 4;

    fn new(counters: &'static Counters) -> Self {
        let mut props = PropertyTable::new();
        props.define("Position", "0").limits(0.0, 3.0);
        props.define("Fault", "None").allowed_values(["None", "Jammed"]);
        props.define("Serial", "W-0001").read_only();
        Self {
            props,
            position: 0,
            _counter: DropCounter::new(counters),
        }
    }
}

impl DriverDevice for Wheel {
    fn category(&self) -> DeviceCategory {
        DeviceCategory::State
    }

    fn properties(&self) -> &PropertyTable {
        &self.props
    }

    fn properties_mut(&mut self) -> &mut PropertyTable {
        &mut self.props
    }

    fn set_property(&mut self, name: &str, value: &str) -> DriverResult<()> {
        if name == "Position" {
            let position = value
                .parse()
                .map_err(|_| DriverError::invalid_value(name, value))?;
            return self.set_position(position);
        }
        self.props.set(name, value)
    }

    fn as_state(&mut self) -> Option<&mut dyn StateDriver> {
        Some(self)
    }
}

impl StateDriver for Wheel {
    fn position(&mut self) -> DriverResult<i64> {
        Ok(self.position)
    }

    fn set_position(&mut self, position: i64) -> DriverResult<()> {
        if self.props.get("Fault").as_deref() == Ok("Jammed") {
            return Err(DriverError::new(status::DRIVER_SPECIFIC, "Wheel jammed"));
        }
        self.props.update("Position", position.to_string())?;
        self.position = position;
        Ok(())
    }

    fn number_of_positions(&self) -> u64 {
        Self::POSITIONS
    }

    fn set_gate_open(&mut self, _open: bool) -> DriverResult<()> {
        Err(DriverError::unsupported("set_gate_open"))
    }

    fn gate_open(&mut self) -> DriverResult<bool> {
        Ok(true)
    }
}

// =============================================================================
// Broken Devices
// =============================================================================

/// Advertised as a state device, reports itself as a shutter.
pub struct Impostor {
    props: PropertyTable,
    _counter: DropCounter,
}

impl DriverDevice for Impostor {
    fn category(&self) -> DeviceCategory {
        DeviceCategory::Shutter
    }

    fn properties(&self) -> &PropertyTable {
        &self.props
    }

    fn properties_mut(&mut self) -> &mut PropertyTable {
        &mut self.props
    }
}

/// Claims the state category but provides no state operations.
pub struct Hollow {
    props: PropertyTable,
    _counter: DropCounter,
}

impl DriverDevice for Hollow {
    fn category(&self) -> DeviceCategory {
        DeviceCategory::State
    }

    fn properties(&self) -> &PropertyTable {
        &self.props
    }

    fn properties_mut(&mut self) -> &mut PropertyTable {
        &mut self.props
    }
}

/// Camera whose reported geometry overflows any frame buffer.
pub struct Giant {
    props: PropertyTable,
    _counter: DropCounter,
}

impl DriverDevice for Giant {
    fn category(&self) -> DeviceCategory {
        DeviceCategory::Camera
    }

    fn properties(&self) -> &PropertyTable {
        &self.props
    }

    fn properties_mut(&mut self) -> &mut PropertyTable {
        &mut self.props
    }

    fn as_camera(&mut self) -> Option<&mut dyn CameraDriver> {
        Some(self)
    }
}

impl CameraDriver for Giant {
    fn snap_image(&mut self) -> DriverResult<()> {
        Ok(())
    }

    fn image_width(&self) -> u32 {
        u32::MAX
    }

    fn image_height(&self) -> u32 {
        u32::MAX
    }

    fn bytes_per_pixel(&self) -> u32 {
        8
    }

    fn image_buffer(&self) -> &[u8] {
        &[]
    }

    fn exposure_ms(&self) -> f64 {
        1.0
    }

    fn set_exposure_ms(&mut self, _exposure_ms: f64) -> DriverResult<()> {
        Ok(())
    }
}

// =============================================================================
// Adapter
// =============================================================================

/// Test bench module.
///
/// `Ghost` is advertised but the factory refuses to build it.
pub struct BenchAdapter;

impl AdapterDefinition for BenchAdapter {
    const DEVICES: &'static [DeviceDescriptor] = &[
        DeviceDescriptor {
            name: "Wheel",
            category: DeviceCategory::State,
            description: "Four-position test wheel",
        },
        DeviceDescriptor {
            name: "Impostor",
            category: DeviceCategory::State,
            description: "Reports the wrong category",
        },
        DeviceDescriptor {
            name: "Hollow",
            category: DeviceCategory::State,
            description: "Has no state interface",
        },
        DeviceDescriptor {
            name: "Giant",
            category: DeviceCategory::Camera,
            description: "Reports an impossible frame size",
        },
        DeviceDescriptor {
            name: "Ghost",
            category: DeviceCategory::Generic,
            description: "Factory always fails",
        },
    ];

    fn initialize() {
        BENCH.initialized.fetch_add(1, Ordering::SeqCst);
    }

    fn create_device(name: &str) -> Option<Box<dyn DriverDevice>> {
        let device: Box<dyn DriverDevice> = match name {
            "Wheel" => Box::new(Wheel::new(&BENCH)),
            "Impostor" => Box::new(Impostor {
                props: PropertyTable::new(),
                _counter: DropCounter::new(&BENCH),
            }),
            "Hollow" => Box::new(Hollow {
                props: PropertyTable::new(),
                _counter: DropCounter::new(&BENCH),
            }),
            "Giant" => Box::new(Giant {
                props: PropertyTable::new(),
                _counter: DropCounter::new(&BENCH),
            }),
            _ => return None,
        };
        Some(device)
    }
}

/// Registry serving the bench module as `bench` and the demo module as `demo`.
pub fn registry() -> ModuleRegistry {
    registry_with_policy(LoadFailurePolicy::Retry)
}

pub fn registry_with_policy(policy: LoadFailurePolicy) -> ModuleRegistry {
    let loader = StaticModuleLoader::new()
        .with_adapter::<BenchAdapter>("bench")
        .with_adapter::<daq_adapter_demo::DemoAdapter>("demo");
    ModuleRegistry::with_policy(loader, policy)
}

/// Create `device` from `module` with a detached controller.
pub fn create(
    registry: &ModuleRegistry,
    module: &str,
    device: &str,
    label: &str,
) -> AdapterResult<TypedDevice> {
    registry.get_or_load(module)?.create_device(
        ControllerRef::detached(),
        device,
        label,
        DeviceLoggers::for_label(label),
    )
}
