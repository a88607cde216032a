//! Safe authoring interface for adapter modules written in Rust.
//!
//! A device implements [`DriverDevice`] and, for its category, exactly one of
//! the category traits ([`StateDriver`], [`CameraDriver`], ...). The export
//! layer in [`crate::export`] turns these into the C vtables of [`crate::abi`].
//!
//! ```rust,ignore
//! struct FilterWheel { props: PropertyTable, position: i64 }
//!
//! impl DriverDevice for FilterWheel {
//!     fn category(&self) -> DeviceCategory { DeviceCategory::State }
//!     fn properties(&self) -> &PropertyTable { &self.props }
//!     fn properties_mut(&mut self) -> &mut PropertyTable { &mut self.props }
//!     fn as_state(&mut self) -> Option<&mut dyn StateDriver> { Some(self) }
//! }
//! ```

use crate::abi::{status, DeviceCategory};

/// Failure reported by driver code, carried to the host as a status code plus text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverError {
    /// Status code, see [`crate::abi::status`].
    pub code: i32,
    /// Description returned to the host for this code.
    pub message: String,
}

impl DriverError {
    /// Error with an explicit code.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// The property is not advertised.
    pub fn unknown_property(name: &str) -> Self {
        Self::new(status::UNKNOWN_PROPERTY, format!("Unknown property '{}'", name))
    }

    /// The value was rejected.
    pub fn invalid_value(name: &str, value: &str) -> Self {
        Self::new(
            status::INVALID_PROPERTY_VALUE,
            format!("Invalid value '{}' for property '{}'", value, name),
        )
    }

    /// The operation is not implemented by this device.
    pub fn unsupported(operation: &str) -> Self {
        Self::new(
            status::UNSUPPORTED_COMMAND,
            format!("Operation '{}' is not supported", operation),
        )
    }
}

impl std::fmt::Display for DriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl std::error::Error for DriverError {}

/// Result type for driver code.
pub type DriverResult<T> = Result<T, DriverError>;

// =============================================================================
// Property Table
// =============================================================================

/// One property held in a [`PropertyTable`].
#[derive(Debug, Clone)]
pub struct Property {
    name: String,
    value: String,
    read_only: bool,
    allowed: Vec<String>,
    limits: Option<(f64, f64)>,
}

impl Property {
    /// Restrict the property to a fixed set of values.
    pub fn allowed_values<I, S>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = values.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict the property to numeric values in `[low, high]`.
    pub fn limits(&mut self, low: f64, high: f64) -> &mut Self {
        self.limits = Some((low, high));
        self
    }

    /// Reject writes from the host.
    pub fn read_only(&mut self) -> &mut Self {
        self.read_only = true;
        self
    }

    fn accepts(&self, value: &str) -> bool {
        if !self.allowed.is_empty() && !self.allowed.iter().any(|v| v == value) {
            return false;
        }
        match self.limits {
            Some((low, high)) => value
                .trim()
                .parse::<f64>()
                .map(|v| v >= low && v <= high)
                .unwrap_or(false),
            None => true,
        }
    }
}

/// Ordered set of string-valued properties with validation.
///
/// Order of definition is the order reported to the host.
#[derive(Debug, Clone, Default)]
pub struct PropertyTable {
    entries: Vec<Property>,
}

impl PropertyTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or redefine) a property and return it for further constraints.
    pub fn define(&mut self, name: impl Into<String>, initial: impl Into<String>) -> &mut Property {
        let name = name.into();
        let value = initial.into();
        let index = match self.entries.iter().position(|p| p.name == name) {
            Some(index) => {
                self.entries[index].value = value;
                index
            }
            None => {
                self.entries.push(Property {
                    name,
                    value,
                    read_only: false,
                    allowed: Vec::new(),
                    limits: None,
                });
                self.entries.len() - 1
            }
        };
        &mut self.entries[index]
    }

    /// Property names in definition order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|p| p.name.as_str())
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no property is defined.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `name` is defined.
    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Current value.
    pub fn get(&self, name: &str) -> DriverResult<String> {
        self.find(name)
            .map(|p| p.value.clone())
            .ok_or_else(|| DriverError::unknown_property(name))
    }

    /// Host write: enforces read-only flags, allowed values and limits.
    ///
    /// The stored value is unchanged when validation fails.
    pub fn set(&mut self, name: &str, value: &str) -> DriverResult<()> {
        let property = self
            .find_mut(name)
            .ok_or_else(|| DriverError::unknown_property(name))?;
        if property.read_only {
            return Err(DriverError::new(
                status::READ_ONLY_PROPERTY,
                format!("Property '{}' is read-only", name),
            ));
        }
        if !property.accepts(value) {
            return Err(DriverError::invalid_value(name, value));
        }
        property.value = value.to_string();
        Ok(())
    }

    /// Driver-side update that bypasses the read-only flag but not validation.
    pub fn update(&mut self, name: &str, value: impl Into<String>) -> DriverResult<()> {
        let value = value.into();
        let property = self
            .find_mut(name)
            .ok_or_else(|| DriverError::unknown_property(name))?;
        if !property.accepts(&value) {
            return Err(DriverError::invalid_value(name, &value));
        }
        property.value = value;
        Ok(())
    }

    /// Whether `name` is read-only.
    pub fn is_read_only(&self, name: &str) -> DriverResult<bool> {
        self.find(name)
            .map(|p| p.read_only)
            .ok_or_else(|| DriverError::unknown_property(name))
    }

    /// Allowed values of `name`; empty when unconstrained.
    pub fn allowed(&self, name: &str) -> DriverResult<&[String]> {
        self.find(name)
            .map(|p| p.allowed.as_slice())
            .ok_or_else(|| DriverError::unknown_property(name))
    }

    fn find(&self, name: &str) -> Option<&Property> {
        self.entries.iter().find(|p| p.name == name)
    }

    fn find_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.entries.iter_mut().find(|p| p.name == name)
    }
}

// =============================================================================
// Device Traits
// =============================================================================

/// Generic device behaviour shared by every category.
///
/// Property access defaults to the [`PropertyTable`]; override
/// [`DriverDevice::get_property`] / [`DriverDevice::set_property`] when reads or
/// writes must reach the hardware.
pub trait DriverDevice: Send {
    /// Category this device belongs to.
    fn category(&self) -> DeviceCategory;

    /// Property storage.
    fn properties(&self) -> &PropertyTable;

    /// Mutable property storage.
    fn properties_mut(&mut self) -> &mut PropertyTable;

    /// Bring the hardware online.
    fn initialize(&mut self) -> DriverResult<()> {
        Ok(())
    }

    /// Release hardware resources.
    fn shutdown(&mut self) -> DriverResult<()> {
        Ok(())
    }

    /// Whether an operation is in progress.
    fn busy(&mut self) -> bool {
        false
    }

    /// Read a property.
    fn get_property(&mut self, name: &str) -> DriverResult<String> {
        self.properties().get(name)
    }

    /// Write a property.
    fn set_property(&mut self, name: &str, value: &str) -> DriverResult<()> {
        self.properties_mut().set(name, value)
    }

    /// State-device operations.
    fn as_state(&mut self) -> Option<&mut dyn StateDriver> {
        None
    }
    /// Shutter operations.
    fn as_shutter(&mut self) -> Option<&mut dyn ShutterDriver> {
        None
    }
    /// Single-axis stage operations.
    fn as_stage(&mut self) -> Option<&mut dyn StageDriver> {
        None
    }
    /// Two-axis stage operations.
    fn as_xy_stage(&mut self) -> Option<&mut dyn XyStageDriver> {
        None
    }
    /// Camera operations.
    fn as_camera(&mut self) -> Option<&mut dyn CameraDriver> {
        None
    }
    /// Serial port operations.
    fn as_serial(&mut self) -> Option<&mut dyn SerialDriver> {
        None
    }
    /// Auto-focus operations.
    fn as_auto_focus(&mut self) -> Option<&mut dyn AutoFocusDriver> {
        None
    }
    /// Image processor operations.
    fn as_image_processor(&mut self) -> Option<&mut dyn ImageProcessorDriver> {
        None
    }
    /// Signal I/O operations.
    fn as_signal_io(&mut self) -> Option<&mut dyn SignalIoDriver> {
        None
    }
    /// Magnifier operations.
    fn as_magnifier(&mut self) -> Option<&mut dyn MagnifierDriver> {
        None
    }
    /// SLM operations.
    fn as_slm(&mut self) -> Option<&mut dyn SlmDriver> {
        None
    }
    /// Hub operations.
    fn as_hub(&mut self) -> Option<&mut dyn HubDriver> {
        None
    }
    /// Galvo operations.
    fn as_galvo(&mut self) -> Option<&mut dyn GalvoDriver> {
        None
    }
}

/// Discrete-position device.
pub trait StateDriver {
    /// Current position.
    fn position(&mut self) -> DriverResult<i64>;
    /// Move to `position`.
    fn set_position(&mut self, position: i64) -> DriverResult<()>;
    /// Number of positions.
    fn number_of_positions(&self) -> u64;
    /// Open or close the gate.
    fn set_gate_open(&mut self, open: bool) -> DriverResult<()>;
    /// Gate state.
    fn gate_open(&mut self) -> DriverResult<bool>;
}

/// Shutter.
pub trait ShutterDriver {
    /// Open or close.
    fn set_open(&mut self, open: bool) -> DriverResult<()>;
    /// Current state.
    fn is_open(&mut self) -> DriverResult<bool>;
    /// Open for a fixed time.
    fn fire(&mut self, delta_t_ms: f64) -> DriverResult<()> {
        let _ = delta_t_ms;
        Err(DriverError::unsupported("fire"))
    }
}

/// Single-axis stage, positions in micrometres.
pub trait StageDriver {
    /// Absolute move.
    fn set_position_um(&mut self, position: f64) -> DriverResult<()>;
    /// Current position.
    fn position_um(&mut self) -> DriverResult<f64>;
    /// Relative move.
    fn set_relative_position_um(&mut self, delta: f64) -> DriverResult<()> {
        let current = self.position_um()?;
        self.set_position_um(current + delta)
    }
    /// Homing sequence.
    fn home(&mut self) -> DriverResult<()> {
        Err(DriverError::unsupported("home"))
    }
    /// Halt motion.
    fn stop(&mut self) -> DriverResult<()> {
        Ok(())
    }
    /// Zero the coordinate system here.
    fn set_origin(&mut self) -> DriverResult<()> {
        Err(DriverError::unsupported("set_origin"))
    }
}

/// Two-axis stage, positions in micrometres.
pub trait XyStageDriver {
    /// Absolute move.
    fn set_position_um(&mut self, x: f64, y: f64) -> DriverResult<()>;
    /// Current position.
    fn position_um(&mut self) -> DriverResult<(f64, f64)>;
    /// Homing sequence.
    fn home(&mut self) -> DriverResult<()> {
        Err(DriverError::unsupported("home"))
    }
    /// Halt motion.
    fn stop(&mut self) -> DriverResult<()> {
        Ok(())
    }
    /// Zero the coordinate system here.
    fn set_origin(&mut self) -> DriverResult<()> {
        Err(DriverError::unsupported("set_origin"))
    }
}

/// Camera.
pub trait CameraDriver {
    /// Expose and read out one image.
    fn snap_image(&mut self) -> DriverResult<()>;
    /// Width in pixels.
    fn image_width(&self) -> u32;
    /// Height in pixels.
    fn image_height(&self) -> u32;
    /// Bytes per pixel.
    fn bytes_per_pixel(&self) -> u32;
    /// Pixels of the last snapped image.
    fn image_buffer(&self) -> &[u8];
    /// Exposure in milliseconds.
    fn exposure_ms(&self) -> f64;
    /// Set exposure in milliseconds.
    fn set_exposure_ms(&mut self, exposure_ms: f64) -> DriverResult<()>;
    /// Binning factor.
    fn binning(&self) -> i32 {
        1
    }
    /// Set binning factor.
    fn set_binning(&mut self, binning: i32) -> DriverResult<()> {
        if binning == 1 {
            Ok(())
        } else {
            Err(DriverError::unsupported("set_binning"))
        }
    }
}

/// Serial port.
pub trait SerialDriver {
    /// Send `command` followed by `terminator`.
    fn set_command(&mut self, command: &str, terminator: &str) -> DriverResult<()>;
    /// Read one answer terminated by `terminator` (stripped).
    fn get_answer(&mut self, terminator: &str) -> DriverResult<String>;
    /// Write raw bytes.
    fn write(&mut self, data: &[u8]) -> DriverResult<()>;
    /// Read into `buf`, returning the count.
    fn read(&mut self, buf: &mut [u8]) -> DriverResult<usize>;
    /// Discard pending input.
    fn purge(&mut self) -> DriverResult<()>;
}

/// Auto-focus device.
pub trait AutoFocusDriver {
    /// Enable or disable continuous focusing.
    fn set_continuous_focusing(&mut self, on: bool) -> DriverResult<()>;
    /// Continuous focusing state.
    fn continuous_focusing(&mut self) -> DriverResult<bool>;
    /// Whether focus is locked.
    fn is_continuous_focus_locked(&mut self) -> bool;
    /// Full focus search.
    fn full_focus(&mut self) -> DriverResult<()>;
    /// Incremental focus search.
    fn incremental_focus(&mut self) -> DriverResult<()>;
    /// Focus offset.
    fn offset(&mut self) -> DriverResult<f64>;
    /// Set focus offset.
    fn set_offset(&mut self, offset: f64) -> DriverResult<()>;
}

/// In-line image transform.
pub trait ImageProcessorDriver {
    /// Transform `image` in place.
    fn process(
        &mut self,
        image: &mut [u8],
        width: u32,
        height: u32,
        bytes_per_pixel: u32,
    ) -> DriverResult<()>;
}

/// Analog or digital I/O line.
pub trait SignalIoDriver {
    /// Output level in volts.
    fn set_signal(&mut self, volts: f64) -> DriverResult<()>;
    /// Current level in volts.
    fn signal(&mut self) -> DriverResult<f64>;
    /// Open or close the gate.
    fn set_gate_open(&mut self, open: bool) -> DriverResult<()>;
    /// Gate state.
    fn gate_open(&mut self) -> DriverResult<bool>;
    /// Output range in volts.
    fn limits(&mut self) -> DriverResult<(f64, f64)>;
}

/// Magnification changer.
pub trait MagnifierDriver {
    /// Magnification factor.
    fn magnification(&mut self) -> f64;
}

/// Spatial light modulator.
pub trait SlmDriver {
    /// Load an image.
    fn set_image(&mut self, pixels: &[u8]) -> DriverResult<()>;
    /// Show the loaded image.
    fn display_image(&mut self) -> DriverResult<()>;
    /// Width in pixels.
    fn width(&self) -> u32;
    /// Height in pixels.
    fn height(&self) -> u32;
    /// Bytes per pixel.
    fn bytes_per_pixel(&self) -> u32;
    /// Exposure in milliseconds.
    fn exposure_ms(&self) -> f64;
    /// Set exposure in milliseconds.
    fn set_exposure_ms(&mut self, exposure_ms: f64) -> DriverResult<()>;
}

/// Parent of peripherals that share one connection.
pub trait HubDriver {
    /// Scan for peripherals.
    fn detect_installed_devices(&mut self) -> DriverResult<()>;
    /// Peripherals found by the last scan.
    fn installed_devices(&self) -> &[String];
}

/// Galvanometer scanner.
pub trait GalvoDriver {
    /// Move and illuminate.
    fn point_and_fire(&mut self, x: f64, y: f64, duration_us: f64) -> DriverResult<()>;
    /// Move.
    fn set_position(&mut self, x: f64, y: f64) -> DriverResult<()>;
    /// Current position.
    fn position(&mut self) -> DriverResult<(f64, f64)>;
    /// Switch illumination.
    fn set_illumination_state(&mut self, on: bool) -> DriverResult<()>;
    /// X travel range.
    fn x_range(&self) -> (f64, f64);
    /// Y travel range.
    fn y_range(&self) -> (f64, f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wheel_table() -> PropertyTable {
        let mut table = PropertyTable::new();
        table.define("Position", "0").limits(0.0, 5.0);
        table.define("Label", "Empty").allowed_values(["Empty", "DAPI", "GFP"]);
        table.define("Description", "Six-slot wheel").read_only();
        table
    }

    #[test]
    fn names_follow_definition_order() {
        let table = wheel_table();
        let names: Vec<_> = table.names().collect();
        assert_eq!(names, vec!["Position", "Label", "Description"]);
    }

    #[test]
    fn rejected_value_leaves_state_unchanged() {
        let mut table = wheel_table();
        let err = table.set("Position", "9").unwrap_err();
        assert_eq!(err.code, status::INVALID_PROPERTY_VALUE);
        assert_eq!(table.get("Position").unwrap(), "0");

        let err = table.set("Label", "Cy5").unwrap_err();
        assert_eq!(err.code, status::INVALID_PROPERTY_VALUE);
        assert_eq!(table.get("Label").unwrap(), "Empty");
    }

    #[test]
    fn read_only_blocks_host_but_not_driver() {
        let mut table = wheel_table();
        let err = table.set("Description", "x").unwrap_err();
        assert_eq!(err.code, status::READ_ONLY_PROPERTY);
        table.update("Description", "Eight-slot wheel").unwrap();
        assert_eq!(table.get("Description").unwrap(), "Eight-slot wheel");
    }

    #[test]
    fn redefine_keeps_position() {
        let mut table = wheel_table();
        table.define("Position", "2");
        assert_eq!(table.len(), 3);
        assert_eq!(table.names().next(), Some("Position"));
        assert_eq!(table.get("Position").unwrap(), "2");
    }

    #[test]
    fn unknown_property_has_its_own_code() {
        let table = wheel_table();
        assert_eq!(
            table.get("Speed").unwrap_err().code,
            status::UNKNOWN_PROPERTY
        );
        assert!(table.allowed("Speed").is_err());
    }
}
