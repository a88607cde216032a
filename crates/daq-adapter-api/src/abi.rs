//! Binary contract between the host and adapter modules.
//!
//! Every type in this module is `#[repr(C)]` and only uses C-compatible
//! primitives, so a module built by any toolchain that honours the layout can be
//! loaded by the host. Strings cross the boundary as NUL-terminated byte strings
//! written into caller-provided buffers of at most [`MAX_STR_LEN`] bytes.
//!
//! # Entry points
//!
//! A module exports the following unmangled symbols:
//!
//! | Symbol | Signature |
//! |--------|-----------|
//! | `daq_adapter_abi_version` | [`AbiVersionFn`] |
//! | `daq_adapter_initialize` | [`InitializeFn`] |
//! | `daq_adapter_device_count` | [`DeviceCountFn`] |
//! | `daq_adapter_device_name` | [`DeviceNameFn`] |
//! | `daq_adapter_device_type` | [`DeviceTypeFn`] |
//! | `daq_adapter_device_description` | [`DeviceDescriptionFn`] |
//! | `daq_adapter_create_device` | [`CreateDeviceFn`] |
//! | `daq_adapter_delete_device` | [`DeleteDeviceFn`] |
//!
//! A device handle is a pointer to a [`RawDevice`] whose only field points at the
//! device's [`DeviceVTable`]. Category-specific tables are obtained with
//! [`DeviceVTable::query_interface`].

use serde::{Deserialize, Serialize};
use std::ffi::{c_char, c_void, CStr};

/// ABI revision implemented by this crate. Modules reporting any other value are rejected.
pub const ABI_VERSION: u32 = 1;

/// Size of every string buffer passed across the boundary, including the terminator.
pub const MAX_STR_LEN: usize = 1024;

/// Status codes returned by device calls.
pub mod status {
    /// Call succeeded.
    pub const OK: i32 = 0;
    /// Unspecified driver failure.
    pub const ERR: i32 = 1;
    /// The named property is not advertised by the device.
    pub const UNKNOWN_PROPERTY: i32 = 2;
    /// The driver rejected the supplied value.
    pub const INVALID_PROPERTY_VALUE: i32 = 3;
    /// The property cannot be written.
    pub const READ_ONLY_PROPERTY: i32 = 4;
    /// The device does not implement the requested operation.
    pub const UNSUPPORTED_COMMAND: i32 = 5;
    /// A result did not fit in the caller's buffer.
    pub const BUFFER_TOO_SMALL: i32 = 6;
    /// Driver code panicked; the device state is unspecified.
    pub const DRIVER_PANIC: i32 = 7;
    /// First code available for driver-specific errors.
    pub const DRIVER_SPECIFIC: i32 = 100;

    /// Default description for the codes defined here.
    pub fn default_text(code: i32) -> String {
        match code {
            OK => "No error".to_string(),
            ERR => "Unspecified device error".to_string(),
            UNKNOWN_PROPERTY => "Unknown property".to_string(),
            INVALID_PROPERTY_VALUE => "Invalid property value".to_string(),
            READ_ONLY_PROPERTY => "Property is read-only".to_string(),
            UNSUPPORTED_COMMAND => "Command not supported by this device".to_string(),
            BUFFER_TOO_SMALL => "Result does not fit in the supplied buffer".to_string(),
            DRIVER_PANIC => "Driver panicked".to_string(),
            other => format!("Device error code {}", other),
        }
    }
}

/// Exported symbol names, NUL-terminated for `dlsym`.
pub mod symbols {
    /// [`super::AbiVersionFn`]
    pub const ABI_VERSION: &[u8] = b"daq_adapter_abi_version\0";
    /// [`super::InitializeFn`]
    pub const INITIALIZE: &[u8] = b"daq_adapter_initialize\0";
    /// [`super::DeviceCountFn`]
    pub const DEVICE_COUNT: &[u8] = b"daq_adapter_device_count\0";
    /// [`super::DeviceNameFn`]
    pub const DEVICE_NAME: &[u8] = b"daq_adapter_device_name\0";
    /// [`super::DeviceTypeFn`]
    pub const DEVICE_TYPE: &[u8] = b"daq_adapter_device_type\0";
    /// [`super::DeviceDescriptionFn`]
    pub const DEVICE_DESCRIPTION: &[u8] = b"daq_adapter_device_description\0";
    /// [`super::CreateDeviceFn`]
    pub const CREATE_DEVICE: &[u8] = b"daq_adapter_create_device\0";
    /// [`super::DeleteDeviceFn`]
    pub const DELETE_DEVICE: &[u8] = b"daq_adapter_delete_device\0";
}

// =============================================================================
// Device Category
// =============================================================================

/// Hardware category a module advertises for each device it can create.
///
/// The numeric tags are part of the ABI and must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum DeviceCategory {
    /// Image sensor
    Camera = 1,
    /// Light-path shutter
    Shutter = 2,
    /// Discrete-position device (filter wheel, turret)
    State = 3,
    /// Single-axis stage
    Stage = 4,
    /// Two-axis stage
    XyStage = 5,
    /// Serial communication port
    Serial = 6,
    /// Device with properties only
    Generic = 7,
    /// Focus-lock or software autofocus
    AutoFocus = 8,
    /// Controller pseudo-device
    Core = 9,
    /// In-line image transform
    ImageProcessor = 10,
    /// Analog or digital I/O line
    SignalIo = 11,
    /// Optical magnification changer
    Magnifier = 12,
    /// Spatial light modulator
    Slm = 13,
    /// Parent device of peripherals sharing one connection
    Hub = 14,
    /// Galvanometer scanner
    Galvo = 15,
}

impl DeviceCategory {
    /// Every category, in tag order.
    pub const ALL: [DeviceCategory; 15] = [
        Self::Camera,
        Self::Shutter,
        Self::State,
        Self::Stage,
        Self::XyStage,
        Self::Serial,
        Self::Generic,
        Self::AutoFocus,
        Self::Core,
        Self::ImageProcessor,
        Self::SignalIo,
        Self::Magnifier,
        Self::Slm,
        Self::Hub,
        Self::Galvo,
    ];

    /// Wire tag for this category.
    pub fn as_raw(self) -> u32 {
        self as u32
    }

    /// Decode a wire tag. Unknown tags yield `None`.
    pub fn from_raw(raw: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_raw() == raw)
    }

    /// Human-readable name
    pub fn name(self) -> &'static str {
        match self {
            Self::Camera => "Camera",
            Self::Shutter => "Shutter",
            Self::State => "State",
            Self::Stage => "Stage",
            Self::XyStage => "XY Stage",
            Self::Serial => "Serial Port",
            Self::Generic => "Generic",
            Self::AutoFocus => "Auto Focus",
            Self::Core => "Core",
            Self::ImageProcessor => "Image Processor",
            Self::SignalIo => "Signal I/O",
            Self::Magnifier => "Magnifier",
            Self::Slm => "SLM",
            Self::Hub => "Hub",
            Self::Galvo => "Galvo",
        }
    }
}

impl std::fmt::Display for DeviceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Module Entry Points
// =============================================================================

/// Returns the ABI revision the module was built against.
pub type AbiVersionFn = unsafe extern "C" fn() -> u32;
/// One-time module initialization, called before enumeration.
pub type InitializeFn = unsafe extern "C" fn();
/// Number of advertised devices.
pub type DeviceCountFn = unsafe extern "C" fn() -> u32;
/// Writes the name of the device at `index`; false if out of range.
pub type DeviceNameFn = unsafe extern "C" fn(index: u32, buf: *mut c_char, cap: usize) -> bool;
/// Raw [`DeviceCategory`] tag of a named device, 0 if unknown.
pub type DeviceTypeFn = unsafe extern "C" fn(name: *const c_char) -> u32;
/// Writes the description of a named device; false if unknown.
pub type DeviceDescriptionFn =
    unsafe extern "C" fn(name: *const c_char, buf: *mut c_char, cap: usize) -> bool;
/// Creates a device; null on failure.
pub type CreateDeviceFn = unsafe extern "C" fn(name: *const c_char) -> *mut RawDevice;
/// Destroys a device previously returned by the same module's [`CreateDeviceFn`].
pub type DeleteDeviceFn = unsafe extern "C" fn(device: *mut RawDevice);

/// The complete set of module entry points.
///
/// Native modules export each function as a separate symbol; statically linked
/// modules hand the host this table directly.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ModuleEntryPoints {
    /// `daq_adapter_abi_version`
    pub abi_version: AbiVersionFn,
    /// `daq_adapter_initialize`
    pub initialize: InitializeFn,
    /// `daq_adapter_device_count`
    pub device_count: DeviceCountFn,
    /// `daq_adapter_device_name`
    pub device_name: DeviceNameFn,
    /// `daq_adapter_device_type`
    pub device_type: DeviceTypeFn,
    /// `daq_adapter_device_description`
    pub device_description: DeviceDescriptionFn,
    /// `daq_adapter_create_device`
    pub create_device: CreateDeviceFn,
    /// `daq_adapter_delete_device`
    pub delete_device: DeleteDeviceFn,
}

impl std::fmt::Debug for ModuleEntryPoints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleEntryPoints").finish_non_exhaustive()
    }
}

// =============================================================================
// Device Handle and VTables
// =============================================================================

/// Header of every device object created by a module.
///
/// Modules embed this as the first field of their own `#[repr(C)]` device
/// struct so a `*mut RawDevice` can be cast back to the full object.
#[repr(C)]
pub struct RawDevice {
    /// Generic device operations.
    pub vtable: *const DeviceVTable,
}

/// Operations every device implements regardless of category.
#[repr(C)]
pub struct DeviceVTable {
    /// Bring the hardware online.
    pub initialize: unsafe extern "C" fn(dev: *mut RawDevice) -> i32,
    /// Release hardware resources; the object stays valid until deleted.
    pub shutdown: unsafe extern "C" fn(dev: *mut RawDevice) -> i32,
    /// Raw [`DeviceCategory`] tag the device itself reports.
    pub device_type: unsafe extern "C" fn(dev: *mut RawDevice) -> u32,
    /// Whether an operation is still in progress.
    pub busy: unsafe extern "C" fn(dev: *mut RawDevice) -> bool,
    /// Number of properties.
    pub property_count: unsafe extern "C" fn(dev: *mut RawDevice) -> u32,
    /// Name of the property at `index`.
    pub property_name:
        unsafe extern "C" fn(dev: *mut RawDevice, index: u32, buf: *mut c_char, cap: usize) -> i32,
    /// Whether the device advertises a property.
    pub has_property: unsafe extern "C" fn(dev: *mut RawDevice, name: *const c_char) -> bool,
    /// Read a property value.
    pub get_property: unsafe extern "C" fn(
        dev: *mut RawDevice,
        name: *const c_char,
        buf: *mut c_char,
        cap: usize,
    ) -> i32,
    /// Write a property value.
    pub set_property:
        unsafe extern "C" fn(dev: *mut RawDevice, name: *const c_char, value: *const c_char) -> i32,
    /// Whether a property is read-only.
    pub property_read_only:
        unsafe extern "C" fn(dev: *mut RawDevice, name: *const c_char, out: *mut bool) -> i32,
    /// Number of allowed values for a property (0 = unconstrained).
    pub allowed_value_count:
        unsafe extern "C" fn(dev: *mut RawDevice, name: *const c_char, out: *mut u32) -> i32,
    /// Allowed value at `index`.
    pub allowed_value: unsafe extern "C" fn(
        dev: *mut RawDevice,
        name: *const c_char,
        index: u32,
        buf: *mut c_char,
        cap: usize,
    ) -> i32,
    /// Description of a status code returned by this device.
    pub error_text:
        unsafe extern "C" fn(dev: *mut RawDevice, code: i32, buf: *mut c_char, cap: usize) -> bool,
    /// Category table for a raw category tag, or null if not provided.
    pub query_interface: unsafe extern "C" fn(dev: *mut RawDevice, category: u32) -> *const c_void,
}

/// [`DeviceCategory::State`] operations.
#[repr(C)]
pub struct StateVTable {
    /// Current position index.
    pub get_position: unsafe extern "C" fn(dev: *mut RawDevice, out: *mut i64) -> i32,
    /// Move to a position index.
    pub set_position: unsafe extern "C" fn(dev: *mut RawDevice, position: i64) -> i32,
    /// Number of positions.
    pub number_of_positions: unsafe extern "C" fn(dev: *mut RawDevice) -> u64,
    /// Open or close the gate.
    pub set_gate_open: unsafe extern "C" fn(dev: *mut RawDevice, open: bool) -> i32,
    /// Gate state.
    pub get_gate_open: unsafe extern "C" fn(dev: *mut RawDevice, out: *mut bool) -> i32,
}

/// [`DeviceCategory::Shutter`] operations.
#[repr(C)]
pub struct ShutterVTable {
    /// Open or close.
    pub set_open: unsafe extern "C" fn(dev: *mut RawDevice, open: bool) -> i32,
    /// Current state.
    pub get_open: unsafe extern "C" fn(dev: *mut RawDevice, out: *mut bool) -> i32,
    /// Open for `delta_t_ms` milliseconds.
    pub fire: unsafe extern "C" fn(dev: *mut RawDevice, delta_t_ms: f64) -> i32,
}

/// [`DeviceCategory::Stage`] operations.
#[repr(C)]
pub struct StageVTable {
    /// Absolute move in micrometres.
    pub set_position_um: unsafe extern "C" fn(dev: *mut RawDevice, pos: f64) -> i32,
    /// Position in micrometres.
    pub get_position_um: unsafe extern "C" fn(dev: *mut RawDevice, out: *mut f64) -> i32,
    /// Relative move in micrometres.
    pub set_relative_position_um: unsafe extern "C" fn(dev: *mut RawDevice, delta: f64) -> i32,
    /// Run the homing sequence.
    pub home: unsafe extern "C" fn(dev: *mut RawDevice) -> i32,
    /// Halt motion.
    pub stop: unsafe extern "C" fn(dev: *mut RawDevice) -> i32,
    /// Define the current position as zero.
    pub set_origin: unsafe extern "C" fn(dev: *mut RawDevice) -> i32,
}

/// [`DeviceCategory::XyStage`] operations.
#[repr(C)]
pub struct XyStageVTable {
    /// Absolute move in micrometres.
    pub set_position_um: unsafe extern "C" fn(dev: *mut RawDevice, x: f64, y: f64) -> i32,
    /// Position in micrometres.
    pub get_position_um:
        unsafe extern "C" fn(dev: *mut RawDevice, x: *mut f64, y: *mut f64) -> i32,
    /// Run the homing sequence.
    pub home: unsafe extern "C" fn(dev: *mut RawDevice) -> i32,
    /// Halt motion.
    pub stop: unsafe extern "C" fn(dev: *mut RawDevice) -> i32,
    /// Define the current position as zero.
    pub set_origin: unsafe extern "C" fn(dev: *mut RawDevice) -> i32,
}

/// [`DeviceCategory::Camera`] operations.
#[repr(C)]
pub struct CameraVTable {
    /// Expose and read out one image; blocks until done.
    pub snap_image: unsafe extern "C" fn(dev: *mut RawDevice) -> i32,
    /// Width in pixels.
    pub image_width: unsafe extern "C" fn(dev: *mut RawDevice) -> u32,
    /// Height in pixels.
    pub image_height: unsafe extern "C" fn(dev: *mut RawDevice) -> u32,
    /// Bytes per pixel.
    pub bytes_per_pixel: unsafe extern "C" fn(dev: *mut RawDevice) -> u32,
    /// Copy the last snapped image into `buf`.
    pub image_buffer: unsafe extern "C" fn(dev: *mut RawDevice, buf: *mut u8, cap: usize) -> i32,
    /// Exposure in milliseconds.
    pub get_exposure: unsafe extern "C" fn(dev: *mut RawDevice) -> f64,
    /// Set exposure in milliseconds.
    pub set_exposure: unsafe extern "C" fn(dev: *mut RawDevice, exposure_ms: f64) -> i32,
    /// Binning factor.
    pub get_binning: unsafe extern "C" fn(dev: *mut RawDevice) -> i32,
    /// Set binning factor.
    pub set_binning: unsafe extern "C" fn(dev: *mut RawDevice, binning: i32) -> i32,
}

/// [`DeviceCategory::Serial`] operations.
#[repr(C)]
pub struct SerialVTable {
    /// Send a command followed by `terminator`.
    pub set_command: unsafe extern "C" fn(
        dev: *mut RawDevice,
        command: *const c_char,
        terminator: *const c_char,
    ) -> i32,
    /// Read until `terminator`, which is stripped.
    pub get_answer: unsafe extern "C" fn(
        dev: *mut RawDevice,
        buf: *mut c_char,
        cap: usize,
        terminator: *const c_char,
    ) -> i32,
    /// Write raw bytes.
    pub write: unsafe extern "C" fn(dev: *mut RawDevice, data: *const u8, len: usize) -> i32,
    /// Read up to `cap` raw bytes; the count read is stored in `read`.
    pub read:
        unsafe extern "C" fn(dev: *mut RawDevice, buf: *mut u8, cap: usize, read: *mut usize) -> i32,
    /// Discard pending input.
    pub purge: unsafe extern "C" fn(dev: *mut RawDevice) -> i32,
}

/// [`DeviceCategory::AutoFocus`] operations.
#[repr(C)]
pub struct AutoFocusVTable {
    /// Enable or disable continuous focusing.
    pub set_continuous_focusing: unsafe extern "C" fn(dev: *mut RawDevice, on: bool) -> i32,
    /// Continuous focusing state.
    pub get_continuous_focusing: unsafe extern "C" fn(dev: *mut RawDevice, out: *mut bool) -> i32,
    /// Whether continuous focus is locked.
    pub is_continuous_focus_locked: unsafe extern "C" fn(dev: *mut RawDevice) -> bool,
    /// Full focus search.
    pub full_focus: unsafe extern "C" fn(dev: *mut RawDevice) -> i32,
    /// Incremental focus search.
    pub incremental_focus: unsafe extern "C" fn(dev: *mut RawDevice) -> i32,
    /// Focus offset.
    pub get_offset: unsafe extern "C" fn(dev: *mut RawDevice, out: *mut f64) -> i32,
    /// Set focus offset.
    pub set_offset: unsafe extern "C" fn(dev: *mut RawDevice, offset: f64) -> i32,
}

/// [`DeviceCategory::ImageProcessor`] operations.
#[repr(C)]
pub struct ImageProcessorVTable {
    /// Transform an image in place.
    pub process: unsafe extern "C" fn(
        dev: *mut RawDevice,
        buf: *mut u8,
        width: u32,
        height: u32,
        bytes_per_pixel: u32,
    ) -> i32,
}

/// [`DeviceCategory::SignalIo`] operations.
#[repr(C)]
pub struct SignalIoVTable {
    /// Output level in volts.
    pub set_signal: unsafe extern "C" fn(dev: *mut RawDevice, volts: f64) -> i32,
    /// Current level in volts.
    pub get_signal: unsafe extern "C" fn(dev: *mut RawDevice, out: *mut f64) -> i32,
    /// Open or close the gate.
    pub set_gate_open: unsafe extern "C" fn(dev: *mut RawDevice, open: bool) -> i32,
    /// Gate state.
    pub get_gate_open: unsafe extern "C" fn(dev: *mut RawDevice, out: *mut bool) -> i32,
    /// Allowed output range in volts.
    pub get_limits:
        unsafe extern "C" fn(dev: *mut RawDevice, min: *mut f64, max: *mut f64) -> i32,
}

/// [`DeviceCategory::Magnifier`] operations.
#[repr(C)]
pub struct MagnifierVTable {
    /// Current magnification factor.
    pub get_magnification: unsafe extern "C" fn(dev: *mut RawDevice) -> f64,
}

/// [`DeviceCategory::Slm`] operations.
#[repr(C)]
pub struct SlmVTable {
    /// Load an image into the device buffer.
    pub set_image: unsafe extern "C" fn(dev: *mut RawDevice, data: *const u8, len: usize) -> i32,
    /// Show the loaded image.
    pub display_image: unsafe extern "C" fn(dev: *mut RawDevice) -> i32,
    /// Width in pixels.
    pub width: unsafe extern "C" fn(dev: *mut RawDevice) -> u32,
    /// Height in pixels.
    pub height: unsafe extern "C" fn(dev: *mut RawDevice) -> u32,
    /// Bytes per pixel.
    pub bytes_per_pixel: unsafe extern "C" fn(dev: *mut RawDevice) -> u32,
    /// Exposure in milliseconds.
    pub get_exposure: unsafe extern "C" fn(dev: *mut RawDevice) -> f64,
    /// Set exposure in milliseconds.
    pub set_exposure: unsafe extern "C" fn(dev: *mut RawDevice, exposure_ms: f64) -> i32,
}

/// [`DeviceCategory::Hub`] operations.
#[repr(C)]
pub struct HubVTable {
    /// Scan the connection for attached peripherals.
    pub detect_installed_devices: unsafe extern "C" fn(dev: *mut RawDevice) -> i32,
    /// Number of peripherals found by the last detection.
    pub installed_device_count: unsafe extern "C" fn(dev: *mut RawDevice) -> u32,
    /// Peripheral name at `index`.
    pub installed_device_name:
        unsafe extern "C" fn(dev: *mut RawDevice, index: u32, buf: *mut c_char, cap: usize) -> i32,
}

/// [`DeviceCategory::Galvo`] operations.
#[repr(C)]
pub struct GalvoVTable {
    /// Move to (x, y) and illuminate for `duration_us`.
    pub point_and_fire:
        unsafe extern "C" fn(dev: *mut RawDevice, x: f64, y: f64, duration_us: f64) -> i32,
    /// Move to (x, y).
    pub set_position: unsafe extern "C" fn(dev: *mut RawDevice, x: f64, y: f64) -> i32,
    /// Current (x, y).
    pub get_position: unsafe extern "C" fn(dev: *mut RawDevice, x: *mut f64, y: *mut f64) -> i32,
    /// Switch illumination.
    pub set_illumination_state: unsafe extern "C" fn(dev: *mut RawDevice, on: bool) -> i32,
    /// X travel range.
    pub get_x_range: unsafe extern "C" fn(dev: *mut RawDevice, min: *mut f64, max: *mut f64) -> i32,
    /// Y travel range.
    pub get_y_range: unsafe extern "C" fn(dev: *mut RawDevice, min: *mut f64, max: *mut f64) -> i32,
}

// =============================================================================
// String Marshalling
// =============================================================================

/// Copy `value` into a caller buffer as a NUL-terminated string.
///
/// Returns false (and writes nothing) if the value plus terminator does not fit.
///
/// # Safety
///
/// `buf` must be valid for writes of `cap` bytes.
pub unsafe fn copy_to_buffer(value: &str, buf: *mut c_char, cap: usize) -> bool {
    let bytes = value.as_bytes();
    if buf.is_null() || bytes.len() >= cap {
        return false;
    }
    // SAFETY: caller guarantees `cap` writable bytes; we write len + 1 <= cap.
    unsafe {
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), buf.cast::<u8>(), bytes.len());
        *buf.add(bytes.len()) = 0;
    }
    true
}

/// Read a NUL-terminated string, replacing invalid UTF-8.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string.
pub unsafe fn read_c_str(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    // SAFETY: caller guarantees termination.
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

/// Decode a string buffer filled by the other side of the boundary.
///
/// Stops at the first NUL; a buffer without one is read in full.
pub fn string_from_buffer(buf: &[c_char]) -> String {
    let bytes: Vec<u8> = buf
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_tags_round_trip() {
        for category in DeviceCategory::ALL {
            assert_eq!(DeviceCategory::from_raw(category.as_raw()), Some(category));
        }
        assert_eq!(DeviceCategory::from_raw(0), None);
        assert_eq!(DeviceCategory::from_raw(16), None);
    }

    #[test]
    fn copy_to_buffer_respects_capacity() {
        let mut buf = [0 as c_char; 4];
        assert!(unsafe { copy_to_buffer("abc", buf.as_mut_ptr(), buf.len()) });
        assert_eq!(string_from_buffer(&buf), "abc");

        let mut small = [0 as c_char; 3];
        assert!(!unsafe { copy_to_buffer("abc", small.as_mut_ptr(), small.len()) });
        assert_eq!(string_from_buffer(&small), "");
    }

    #[test]
    fn read_c_str_handles_null() {
        assert_eq!(unsafe { read_c_str(std::ptr::null()) }, "");
        let owned = std::ffi::CString::new("Wheel").unwrap();
        assert_eq!(unsafe { read_c_str(owned.as_ptr()) }, "Wheel");
    }

    #[test]
    fn default_text_covers_driver_specific_codes() {
        assert_eq!(status::default_text(status::UNKNOWN_PROPERTY), "Unknown property");
        assert_eq!(status::default_text(142), "Device error code 142");
    }
}
