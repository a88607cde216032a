//! Demonstration Device Adapter
//!
//! Simulated devices for exercising the adapter host without hardware. Built as
//! a `cdylib` it is a loadable module called `demo`; as an `rlib` it can be
//! linked into tests through `daq_adapter_api::entry_points::<DemoAdapter>()`.
//!
//! # Available Devices
//!
//! - `DWheel` - six-position filter wheel with named slots
//! - `DShutter` - shutter with an interlock property
//! - `DStage` - focus drive, -5000..5000 um
//! - `DXYStage` - two-axis stage, 0..100000 um on each axis
//! - `DCamera` - 64x48 16-bit camera producing a gradient test frame
//! - `DHub` - hub reporting the other demo devices as its peripherals
//! - `DObjective` - magnifier following its `Magnification` property
//! - `DDac` - analog output, 0..10 V
//!
//! # Loading
//!
//! ```bash
//! cargo build -p daq-adapter-demo
//! daq-adapters --search-path target/debug inspect demo DWheel --label Emission
//! ```

// `export_device_adapter!` emits `#[no_mangle]` entry points, each documented.
#![allow(unsafe_code)]
#![deny(missing_docs)]

use daq_adapter_api::prelude::*;

/// The demo module.
pub struct DemoAdapter;

impl AdapterDefinition for DemoAdapter {
    const DEVICES: &'static [DeviceDescriptor] = &[
        DeviceDescriptor {
            name: "DWheel",
            category: DeviceCategory::State,
            description: "Demo filter wheel",
        },
        DeviceDescriptor {
            name: "DShutter",
            category: DeviceCategory::Shutter,
            description: "Demo shutter",
        },
        DeviceDescriptor {
            name: "DStage",
            category: DeviceCategory::Stage,
            description: "Demo focus drive",
        },
        DeviceDescriptor {
            name: "DXYStage",
            category: DeviceCategory::XyStage,
            description: "Demo XY stage",
        },
        DeviceDescriptor {
            name: "DCamera",
            category: DeviceCategory::Camera,
            description: "Demo camera",
        },
        DeviceDescriptor {
            name: "DHub",
            category: DeviceCategory::Hub,
            description: "Demo hub",
        },
        DeviceDescriptor {
            name: "DObjective",
            category: DeviceCategory::Magnifier,
            description: "Demo objective turret magnification",
        },
        DeviceDescriptor {
            name: "DDac",
            category: DeviceCategory::SignalIo,
            description: "Demo analog output",
        },
    ];

    fn initialize() {
        tracing::debug!(devices = Self::DEVICES.len(), "demo adapter initialized");
    }

    fn create_device(name: &str) -> Option<Box<dyn DriverDevice>> {
        let device: Box<dyn DriverDevice> = match name {
            "DWheel" => Box::new(DemoWheel::new()),
            "DShutter" => Box::new(DemoShutter::new()),
            "DStage" => Box::new(DemoStage::new()),
            "DXYStage" => Box::new(DemoXyStage::new()),
            "DCamera" => Box::new(DemoCamera::new()),
            "DHub" => Box::new(DemoHub::new()),
            "DObjective" => Box::new(DemoObjective::new()),
            "DDac" => Box::new(DemoDac::new()),
            _ => return None,
        };
        Some(device)
    }
}

export_device_adapter!(DemoAdapter);

// =============================================================================
// Filter Wheel
// =============================================================================

const WHEEL_SLOTS: [&str; 6] = ["Empty", "DAPI", "FITC", "TRITC", "Cy5", "Blocked"];

/// Six-slot wheel. `Position` and `Label` are two views of the same state.
struct DemoWheel {
    props: PropertyTable,
    position: i64,
    gate_open: bool,
}

impl DemoWheel {
    fn new() -> Self {
        let mut props = PropertyTable::new();
        props
            .define("Position", "0")
            .limits(0.0, (WHEEL_SLOTS.len() - 1) as f64);
        props.define("Label", WHEEL_SLOTS[0]).allowed_values(WHEEL_SLOTS);
        props.define("Description", "Demo filter wheel").read_only();
        Self {
            props,
            position: 0,
            gate_open: true,
        }
    }

    fn move_to(&mut self, position: i64) -> DriverResult<()> {
        let slot = usize::try_from(position)
            .ok()
            .and_then(|index| WHEEL_SLOTS.get(index))
            .ok_or_else(|| DriverError::invalid_value("Position", &position.to_string()))?;
        self.props.update("Position", position.to_string())?;
        self.props.update("Label", *slot)?;
        self.position = position;
        tracing::trace!(position, slot, "demo wheel moved");
        Ok(())
    }
}

impl DriverDevice for DemoWheel {
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
        match name {
            "Position" => {
                let position = value
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| DriverError::invalid_value(name, value))?;
                self.move_to(position)
            }
            "Label" => {
                let index = WHEEL_SLOTS
                    .iter()
                    .position(|slot| *slot == value)
                    .ok_or_else(|| DriverError::invalid_value(name, value))?;
                self.move_to(index as i64)
            }
            _ => self.props.set(name, value),
        }
    }

    fn as_state(&mut self) -> Option<&mut dyn StateDriver> {
        Some(self)
    }
}

impl StateDriver for DemoWheel {
    fn position(&mut self) -> DriverResult<i64> {
        Ok(self.position)
    }

    fn set_position(&mut self, position: i64) -> DriverResult<()> {
        self.move_to(position)
    }

    fn number_of_positions(&self) -> u64 {
        WHEEL_SLOTS.len() as u64
    }

    fn set_gate_open(&mut self, open: bool) -> DriverResult<()> {
        self.gate_open = open;
        Ok(())
    }

    fn gate_open(&mut self) -> DriverResult<bool> {
        Ok(self.gate_open)
    }
}

// =============================================================================
// Shutter
// =============================================================================

struct DemoShutter {
    props: PropertyTable,
    open: bool,
}

impl DemoShutter {
    fn new() -> Self {
        let mut props = PropertyTable::new();
        props.define("State", "0").allowed_values(["0", "1"]);
        props
            .define("Interlock", "Released")
            .allowed_values(["Released", "Engaged"]);
        Self { props, open: false }
    }
}

impl DriverDevice for DemoShutter {
    fn category(&self) -> DeviceCategory {
        DeviceCategory::Shutter
    }

    fn properties(&self) -> &PropertyTable {
        &self.props
    }

    fn properties_mut(&mut self) -> &mut PropertyTable {
        &mut self.props
    }

    fn set_property(&mut self, name: &str, value: &str) -> DriverResult<()> {
        if name == "State" {
            return match value {
                "0" => self.set_open(false),
                "1" => self.set_open(true),
                _ => Err(DriverError::invalid_value(name, value)),
            };
        }
        self.props.set(name, value)
    }

    fn as_shutter(&mut self) -> Option<&mut dyn ShutterDriver> {
        Some(self)
    }
}

impl ShutterDriver for DemoShutter {
    fn set_open(&mut self, open: bool) -> DriverResult<()> {
        if open && self.props.get("Interlock").as_deref() == Ok("Engaged") {
            return Err(DriverError::new(status::DRIVER_SPECIFIC, "Interlock engaged"));
        }
        self.props.update("State", if open { "1" } else { "0" })?;
        self.open = open;
        Ok(())
    }

    fn is_open(&mut self) -> DriverResult<bool> {
        Ok(self.open)
    }

    fn fire(&mut self, delta_t_ms: f64) -> DriverResult<()> {
        if delta_t_ms <= 0.0 {
            return Err(DriverError::new(
                status::ERR,
                format!("Exposure of {} ms is not positive", delta_t_ms),
            ));
        }
        // Pulse is instantaneous in simulation.
        self.set_open(true)?;
        self.set_open(false)
    }
}

// =============================================================================
// Stages
// =============================================================================

const FOCUS_RANGE_UM: (f64, f64) = (-5000.0, 5000.0);
const XY_RANGE_UM: (f64, f64) = (0.0, 100_000.0);

fn check_travel(axis: &str, value: f64, (low, high): (f64, f64)) -> DriverResult<()> {
    if value.is_finite() && value >= low && value <= high {
        Ok(())
    } else {
        Err(DriverError::new(
            status::DRIVER_SPECIFIC,
            format!("{} target {} um outside travel {}..{}", axis, value, low, high),
        ))
    }
}

struct DemoStage {
    props: PropertyTable,
    position: f64,
    origin: f64,
}

impl DemoStage {
    fn new() -> Self {
        let mut props = PropertyTable::new();
        props.define("Position", "0").read_only();
        Self {
            props,
            position: 0.0,
            origin: 0.0,
        }
    }
}

impl DriverDevice for DemoStage {
    fn category(&self) -> DeviceCategory {
        DeviceCategory::Stage
    }

    fn properties(&self) -> &PropertyTable {
        &self.props
    }

    fn properties_mut(&mut self) -> &mut PropertyTable {
        &mut self.props
    }

    fn as_stage(&mut self) -> Option<&mut dyn StageDriver> {
        Some(self)
    }
}

impl StageDriver for DemoStage {
    fn set_position_um(&mut self, position: f64) -> DriverResult<()> {
        let absolute = position + self.origin;
        check_travel("Z", absolute, FOCUS_RANGE_UM)?;
        self.position = absolute;
        self.props.update("Position", position.to_string())
    }

    fn position_um(&mut self) -> DriverResult<f64> {
        Ok(self.position - self.origin)
    }

    fn home(&mut self) -> DriverResult<()> {
        self.origin = 0.0;
        self.position = 0.0;
        self.props.update("Position", "0")
    }

    fn set_origin(&mut self) -> DriverResult<()> {
        self.origin = self.position;
        self.props.update("Position", "0")
    }
}

struct DemoXyStage {
    props: PropertyTable,
    x: f64,
    y: f64,
}

impl DemoXyStage {
    fn new() -> Self {
        let mut props = PropertyTable::new();
        props.define("Velocity", "10").limits(0.1, 50.0);
        Self {
            props,
            x: 0.0,
            y: 0.0,
        }
    }
}

impl DriverDevice for DemoXyStage {
    fn category(&self) -> DeviceCategory {
        DeviceCategory::XyStage
    }

    fn properties(&self) -> &PropertyTable {
        &self.props
    }

    fn properties_mut(&mut self) -> &mut PropertyTable {
        &mut self.props
    }

    fn as_xy_stage(&mut self) -> Option<&mut dyn XyStageDriver> {
        Some(self)
    }
}

impl XyStageDriver for DemoXyStage {
    fn set_position_um(&mut self, x: f64, y: f64) -> DriverResult<()> {
        check_travel("X", x, XY_RANGE_UM)?;
        check_travel("Y", y, XY_RANGE_UM)?;
        self.x = x;
        self.y = y;
        Ok(())
    }

    fn position_um(&mut self) -> DriverResult<(f64, f64)> {
        Ok((self.x, self.y))
    }

    fn home(&mut self) -> DriverResult<()> {
        self.x = XY_RANGE_UM.0;
        self.y = XY_RANGE_UM.0;
        Ok(())
    }
}

// =============================================================================
// Camera
// =============================================================================

const CAMERA_WIDTH: u32 = 64;
const CAMERA_HEIGHT: u32 = 48;

/// 16-bit camera; every snap produces a diagonal gradient offset by the frame count.
struct DemoCamera {
    props: PropertyTable,
    exposure_ms: f64,
    binning: i32,
    frame: Vec<u8>,
    frames_snapped: u64,
}

impl DemoCamera {
    fn new() -> Self {
        let mut props = PropertyTable::new();
        props.define("Exposure", "10").limits(0.01, 10_000.0);
        props.define("Binning", "1").allowed_values(["1", "2", "4"]);
        props.define("PixelType", "16bit").read_only();
        Self {
            props,
            exposure_ms: 10.0,
            binning: 1,
            frame: Vec::new(),
            frames_snapped: 0,
        }
    }

    fn generate_frame(&mut self) {
        let width = self.image_width() as usize;
        let height = self.image_height() as usize;
        let offset = self.frames_snapped as usize;
        let span = (width + height).max(1);
        self.frame = (0..height)
            .flat_map(|y| (0..width).map(move |x| x + y))
            .flat_map(|d| {
                let value = ((d + offset) % span * usize::from(u16::MAX) / span) as u16;
                value.to_le_bytes()
            })
            .collect();
    }
}

impl DriverDevice for DemoCamera {
    fn category(&self) -> DeviceCategory {
        DeviceCategory::Camera
    }

    fn properties(&self) -> &PropertyTable {
        &self.props
    }

    fn properties_mut(&mut self) -> &mut PropertyTable {
        &mut self.props
    }

    fn set_property(&mut self, name: &str, value: &str) -> DriverResult<()> {
        self.props.set(name, value)?;
        match name {
            "Exposure" => {
                self.exposure_ms = value
                    .trim()
                    .parse()
                    .map_err(|_| DriverError::invalid_value(name, value))?;
            }
            "Binning" => {
                self.binning = value
                    .trim()
                    .parse()
                    .map_err(|_| DriverError::invalid_value(name, value))?;
            }
            _ => {}
        }
        Ok(())
    }

    fn as_camera(&mut self) -> Option<&mut dyn CameraDriver> {
        Some(self)
    }
}

impl CameraDriver for DemoCamera {
    fn snap_image(&mut self) -> DriverResult<()> {
        self.generate_frame();
        self.frames_snapped += 1;
        Ok(())
    }

    fn image_width(&self) -> u32 {
        CAMERA_WIDTH / self.binning.max(1) as u32
    }

    fn image_height(&self) -> u32 {
        CAMERA_HEIGHT / self.binning.max(1) as u32
    }

    fn bytes_per_pixel(&self) -> u32 {
        2
    }

    fn image_buffer(&self) -> &[u8] {
        &self.frame
    }

    fn exposure_ms(&self) -> f64 {
        self.exposure_ms
    }

    fn set_exposure_ms(&mut self, exposure_ms: f64) -> DriverResult<()> {
        self.props.update("Exposure", exposure_ms.to_string())?;
        self.exposure_ms = exposure_ms;
        Ok(())
    }

    fn binning(&self) -> i32 {
        self.binning
    }

    fn set_binning(&mut self, binning: i32) -> DriverResult<()> {
        self.props.update("Binning", binning.to_string())?;
        self.binning = binning;
        self.frame.clear();
        Ok(())
    }
}

// =============================================================================
// Hub
// =============================================================================

struct DemoHub {
    props: PropertyTable,
    installed: Vec<String>,
}

impl DemoHub {
    fn new() -> Self {
        let mut props = PropertyTable::new();
        props.define("Port", "Undefined");
        Self {
            props,
            installed: Vec::new(),
        }
    }
}

impl DriverDevice for DemoHub {
    fn category(&self) -> DeviceCategory {
        DeviceCategory::Hub
    }

    fn properties(&self) -> &PropertyTable {
        &self.props
    }

    fn properties_mut(&mut self) -> &mut PropertyTable {
        &mut self.props
    }

    fn as_hub(&mut self) -> Option<&mut dyn HubDriver> {
        Some(self)
    }
}

impl HubDriver for DemoHub {
    fn detect_installed_devices(&mut self) -> DriverResult<()> {
        self.installed = DemoAdapter::DEVICES
            .iter()
            .filter(|d| d.category != DeviceCategory::Hub)
            .map(|d| d.name.to_string())
            .collect();
        Ok(())
    }

    fn installed_devices(&self) -> &[String] {
        &self.installed
    }
}

// =============================================================================
// Magnifier
// =============================================================================

struct DemoObjective {
    props: PropertyTable,
}

impl DemoObjective {
    fn new() -> Self {
        let mut props = PropertyTable::new();
        props
            .define("Magnification", "10")
            .allowed_values(["4", "10", "20", "40", "63"]);
        Self { props }
    }
}

impl DriverDevice for DemoObjective {
    fn category(&self) -> DeviceCategory {
        DeviceCategory::Magnifier
    }

    fn properties(&self) -> &PropertyTable {
        &self.props
    }

    fn properties_mut(&mut self) -> &mut PropertyTable {
        &mut self.props
    }

    fn as_magnifier(&mut self) -> Option<&mut dyn MagnifierDriver> {
        Some(self)
    }
}

impl MagnifierDriver for DemoObjective {
    fn magnification(&mut self) -> f64 {
        self.props
            .get("Magnification")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1.0)
    }
}

// =============================================================================
// Signal I/O
// =============================================================================

const DAC_RANGE_V: (f64, f64) = (0.0, 10.0);

struct DemoDac {
    props: PropertyTable,
    volts: f64,
    gate_open: bool,
}

impl DemoDac {
    fn new() -> Self {
        let mut props = PropertyTable::new();
        props.define("Volts", "0").limits(DAC_RANGE_V.0, DAC_RANGE_V.1);
        Self {
            props,
            volts: 0.0,
            gate_open: true,
        }
    }
}

impl DriverDevice for DemoDac {
    fn category(&self) -> DeviceCategory {
        DeviceCategory::SignalIo
    }

    fn properties(&self) -> &PropertyTable {
        &self.props
    }

    fn properties_mut(&mut self) -> &mut PropertyTable {
        &mut self.props
    }

    fn as_signal_io(&mut self) -> Option<&mut dyn SignalIoDriver> {
        Some(self)
    }
}

impl SignalIoDriver for DemoDac {
    fn set_signal(&mut self, volts: f64) -> DriverResult<()> {
        self.props.update("Volts", volts.to_string())?;
        self.volts = volts;
        Ok(())
    }

    fn signal(&mut self) -> DriverResult<f64> {
        Ok(if self.gate_open { self.volts } else { 0.0 })
    }

    fn set_gate_open(&mut self, open: bool) -> DriverResult<()> {
        self.gate_open = open;
        Ok(())
    }

    fn gate_open(&mut self) -> DriverResult<bool> {
        Ok(self.gate_open)
    }

    fn limits(&mut self) -> DriverResult<(f64, f64)> {
        Ok(DAC_RANGE_V)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exported_entry_points_describe_the_module() {
        // SAFETY: no arguments; the module needs no setup for these queries.
        let (abi, count) = unsafe { (daq_adapter_abi_version(), daq_adapter_device_count()) };
        assert_eq!(abi, daq_adapter_api::abi::ABI_VERSION);
        assert_eq!(count as usize, DemoAdapter::DEVICES.len());
    }

    #[test]
    fn every_advertised_device_can_be_created_with_its_category() {
        for descriptor in DemoAdapter::DEVICES {
            let device = DemoAdapter::create_device(descriptor.name).unwrap();
            assert_eq!(device.category(), descriptor.category, "{}", descriptor.name);
        }
        assert!(DemoAdapter::create_device("DLaser").is_none());
    }

    #[test]
    fn wheel_keeps_position_and_label_in_step() {
        let mut wheel = DemoWheel::new();
        wheel.set_position(2).unwrap();
        assert_eq!(wheel.props.get("Label").unwrap(), "FITC");

        wheel.set_property("Label", "Cy5").unwrap();
        assert_eq!(wheel.position().unwrap(), 4);
        assert_eq!(wheel.props.get("Position").unwrap(), "4");
    }

    #[test]
    fn wheel_rejects_out_of_range_position() {
        let mut wheel = DemoWheel::new();
        wheel.set_position(1).unwrap();
        let err = wheel.set_position(6).unwrap_err();
        assert_eq!(err.code, status::INVALID_PROPERTY_VALUE);
        assert_eq!(wheel.position().unwrap(), 1);
        assert_eq!(wheel.props.get("Label").unwrap(), "DAPI");
    }

    #[test]
    fn shutter_interlock_blocks_opening() {
        let mut shutter = DemoShutter::new();
        shutter.set_property("Interlock", "Engaged").unwrap();
        let err = shutter.set_open(true).unwrap_err();
        assert_eq!(err.code, status::DRIVER_SPECIFIC);
        assert!(!shutter.is_open().unwrap());
    }

    #[test]
    fn stage_origin_shifts_reported_position() {
        let mut stage = DemoStage::new();
        stage.set_position_um(100.0).unwrap();
        stage.set_origin().unwrap();
        assert_eq!(stage.position_um().unwrap(), 0.0);
        stage.set_relative_position_um(-50.0).unwrap();
        assert_eq!(stage.position_um().unwrap(), -50.0);
        assert!(stage.set_position_um(10_000.0).is_err());
    }

    #[test]
    fn camera_frame_matches_geometry() {
        let mut camera = DemoCamera::new();
        camera.snap_image().unwrap();
        assert_eq!(
            camera.image_buffer().len(),
            (CAMERA_WIDTH * CAMERA_HEIGHT * 2) as usize
        );

        camera.set_binning(2).unwrap();
        camera.snap_image().unwrap();
        assert_eq!(camera.image_width(), CAMERA_WIDTH / 2);
        assert_eq!(
            camera.image_buffer().len(),
            (camera.image_width() * camera.image_height() * 2) as usize
        );
        assert!(camera.set_binning(3).is_err());
    }

    #[test]
    fn hub_lists_peripherals() {
        let mut hub = DemoHub::new();
        assert!(hub.installed_devices().is_empty());
        hub.detect_installed_devices().unwrap();
        assert_eq!(hub.installed_devices().len(), DemoAdapter::DEVICES.len() - 1);
        assert!(!hub.installed_devices().iter().any(|d| d == "DHub"));
    }

    #[test]
    fn dac_gate_masks_output() {
        let mut dac = DemoDac::new();
        dac.set_signal(2.5).unwrap();
        dac.set_gate_open(false).unwrap();
        assert_eq!(dac.signal().unwrap(), 0.0);
        assert!(dac.set_signal(12.0).is_err());
    }

    #[test]
    fn entry_points_report_demo_devices() {
        let eps = entry_points::<DemoAdapter>();
        assert_eq!(unsafe { (eps.device_count)() }, DemoAdapter::DEVICES.len() as u32);
    }
}
