//! Glue that exposes [`DriverDevice`] implementations through the C ABI.
//!
//! Devices are boxed into a `#[repr(C)]` cell whose first field is the
//! [`RawDevice`] header, so the handle given to the host can be cast back on
//! every call. All trampolines catch panics and turn them into
//! [`status::DRIVER_PANIC`].

use crate::abi::{
    copy_to_buffer, read_c_str, status, AutoFocusVTable, CameraVTable, DeviceCategory,
    DeviceVTable, GalvoVTable, HubVTable, ImageProcessorVTable, MagnifierVTable,
    ModuleEntryPoints, RawDevice, SerialVTable, ShutterVTable, SignalIoVTable, SlmVTable,
    StageVTable, StateVTable, XyStageVTable, ABI_VERSION,
};
use crate::driver::{
    AutoFocusDriver, CameraDriver, DriverDevice, DriverError, DriverResult, GalvoDriver,
    HubDriver, ImageProcessorDriver, SerialDriver, ShutterDriver, SignalIoDriver, SlmDriver,
    StageDriver, StateDriver, XyStageDriver,
};
use std::ffi::{c_char, c_void};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Static description of one device a module advertises.
#[derive(Debug, Clone, Copy)]
pub struct DeviceDescriptor {
    /// Name the host uses to request the device.
    pub name: &'static str,
    /// Advertised category.
    pub category: DeviceCategory,
    /// Human-readable description.
    pub description: &'static str,
}

/// An adapter module: the devices it advertises and how to build them.
pub trait AdapterDefinition: 'static {
    /// Advertised devices, in the order reported to the host.
    const DEVICES: &'static [DeviceDescriptor];

    /// One-time module setup, called by the host before enumeration.
    fn initialize() {}

    /// Build the named device. `None` makes the host report a creation failure.
    fn create_device(name: &str) -> Option<Box<dyn DriverDevice>>;
}

/// Entry-point table for a module linked into the host process.
pub fn entry_points<A: AdapterDefinition>() -> ModuleEntryPoints {
    ModuleEntryPoints {
        abi_version: module_abi_version,
        initialize: module_initialize::<A>,
        device_count: module_device_count::<A>,
        device_name: module_device_name::<A>,
        device_type: module_device_type::<A>,
        device_description: module_device_description::<A>,
        create_device: module_create_device::<A>,
        delete_device: module_delete_device,
    }
}

/// Export the C entry points of an [`AdapterDefinition`] from a `cdylib`.
///
/// ```rust,ignore
/// daq_adapter_api::export_device_adapter!(DemoAdapter);
/// ```
#[macro_export]
macro_rules! export_device_adapter {
    ($adapter:ty) => {
        /// ABI revision this module was built against.
        ///
        /// # Safety
        ///
        /// Always safe to call; `unsafe` only to match the entry point type.
        #[no_mangle]
        pub unsafe extern "C" fn daq_adapter_abi_version() -> u32 {
            unsafe { ($crate::export::entry_points::<$adapter>().abi_version)() }
        }

        /// One-time module initialization.
        ///
        /// # Safety
        ///
        /// Called by the host once per load, before enumeration.
        #[no_mangle]
        pub unsafe extern "C" fn daq_adapter_initialize() {
            unsafe { ($crate::export::entry_points::<$adapter>().initialize)() }
        }

        /// Number of advertised devices.
        ///
        /// # Safety
        ///
        /// Always safe to call; `unsafe` only to match the entry point type.
        #[no_mangle]
        pub unsafe extern "C" fn daq_adapter_device_count() -> u32 {
            unsafe { ($crate::export::entry_points::<$adapter>().device_count)() }
        }

        /// Writes the name of the device at `index` into `buf`.
        ///
        /// # Safety
        ///
        /// `buf` must be writable for `cap` bytes.
        #[no_mangle]
        pub unsafe extern "C" fn daq_adapter_device_name(
            index: u32,
            buf: *mut ::std::ffi::c_char,
            cap: usize,
        ) -> bool {
            unsafe { ($crate::export::entry_points::<$adapter>().device_name)(index, buf, cap) }
        }

        /// Raw category tag of the device called `name`, 0 if unknown.
        ///
        /// # Safety
        ///
        /// `name` must be a valid NUL-terminated string.
        #[no_mangle]
        pub unsafe extern "C" fn daq_adapter_device_type(name: *const ::std::ffi::c_char) -> u32 {
            unsafe { ($crate::export::entry_points::<$adapter>().device_type)(name) }
        }

        /// Writes the description of the device called `name` into `buf`.
        ///
        /// # Safety
        ///
        /// `name` must be a valid NUL-terminated string and `buf` writable for
        /// `cap` bytes.
        #[no_mangle]
        pub unsafe extern "C" fn daq_adapter_device_description(
            name: *const ::std::ffi::c_char,
            buf: *mut ::std::ffi::c_char,
            cap: usize,
        ) -> bool {
            unsafe {
                ($crate::export::entry_points::<$adapter>().device_description)(name, buf, cap)
            }
        }

        /// Creates the device called `name`; null on failure.
        ///
        /// # Safety
        ///
        /// `name` must be a valid NUL-terminated string. The result must be
        /// released with `daq_adapter_delete_device` of this module.
        #[no_mangle]
        pub unsafe extern "C" fn daq_adapter_create_device(
            name: *const ::std::ffi::c_char,
        ) -> *mut $crate::abi::RawDevice {
            unsafe { ($crate::export::entry_points::<$adapter>().create_device)(name) }
        }

        /// Destroys a device created by this module.
        ///
        /// # Safety
        ///
        /// `device` must come from `daq_adapter_create_device` of this module
        /// and must not be used afterwards.
        #[no_mangle]
        pub unsafe extern "C" fn daq_adapter_delete_device(device: *mut $crate::abi::RawDevice) {
            unsafe { ($crate::export::entry_points::<$adapter>().delete_device)(device) }
        }
    };
}

// =============================================================================
// Module Trampolines
// =============================================================================

unsafe extern "C" fn module_abi_version() -> u32 {
    ABI_VERSION
}

unsafe extern "C" fn module_initialize<A: AdapterDefinition>() {
    if catch_unwind(A::initialize).is_err() {
        tracing::error!("adapter initialization panicked");
    }
}

unsafe extern "C" fn module_device_count<A: AdapterDefinition>() -> u32 {
    A::DEVICES.len() as u32
}

unsafe extern "C" fn module_device_name<A: AdapterDefinition>(
    index: u32,
    buf: *mut c_char,
    cap: usize,
) -> bool {
    match A::DEVICES.get(index as usize) {
        // SAFETY: the host passes a buffer of `cap` bytes.
        Some(descriptor) => unsafe { copy_to_buffer(descriptor.name, buf, cap) },
        None => false,
    }
}

fn find_descriptor<A: AdapterDefinition>(name: *const c_char) -> Option<&'static DeviceDescriptor> {
    // SAFETY: the host passes a NUL-terminated name.
    let name = unsafe { read_c_str(name) };
    A::DEVICES.iter().find(|d| d.name == name)
}

unsafe extern "C" fn module_device_type<A: AdapterDefinition>(name: *const c_char) -> u32 {
    find_descriptor::<A>(name)
        .map(|d| d.category.as_raw())
        .unwrap_or(0)
}

unsafe extern "C" fn module_device_description<A: AdapterDefinition>(
    name: *const c_char,
    buf: *mut c_char,
    cap: usize,
) -> bool {
    match find_descriptor::<A>(name) {
        // SAFETY: the host passes a buffer of `cap` bytes.
        Some(descriptor) => unsafe { copy_to_buffer(descriptor.description, buf, cap) },
        None => false,
    }
}

unsafe extern "C" fn module_create_device<A: AdapterDefinition>(
    name: *const c_char,
) -> *mut RawDevice {
    // SAFETY: the host passes a NUL-terminated name.
    let name = unsafe { read_c_str(name) };
    match catch_unwind(|| A::create_device(&name)) {
        Ok(Some(device)) => into_raw(device),
        Ok(None) => std::ptr::null_mut(),
        Err(_) => {
            tracing::error!(device = %name, "device factory panicked");
            std::ptr::null_mut()
        }
    }
}

unsafe extern "C" fn module_delete_device(device: *mut RawDevice) {
    if device.is_null() {
        return;
    }
    // SAFETY: the host only passes handles produced by `module_create_device`.
    let cell = unsafe { Box::from_raw(device.cast::<DeviceCell>()) };
    if catch_unwind(AssertUnwindSafe(move || drop(cell))).is_err() {
        tracing::error!("device destructor panicked");
    }
}

// =============================================================================
// Device Cell
// =============================================================================

#[repr(C)]
struct DeviceCell {
    raw: RawDevice,
    last_error: Option<DriverError>,
    device: Box<dyn DriverDevice>,
}

fn into_raw(device: Box<dyn DriverDevice>) -> *mut RawDevice {
    let cell = Box::new(DeviceCell {
        raw: RawDevice {
            vtable: &DEVICE_VTABLE,
        },
        last_error: None,
        device,
    });
    Box::into_raw(cell).cast::<RawDevice>()
}

/// # Safety
///
/// `dev` must be a live handle produced by [`into_raw`].
unsafe fn cell<'a>(dev: *mut RawDevice) -> &'a mut DeviceCell {
    // SAFETY: `RawDevice` is the first field of the `#[repr(C)]` cell.
    unsafe { &mut *dev.cast::<DeviceCell>() }
}

/// Run a fallible driver call, recording the error text for `error_text`.
///
/// # Safety
///
/// `dev` must be a live handle produced by [`into_raw`].
unsafe fn run(
    dev: *mut RawDevice,
    op: impl FnOnce(&mut dyn DriverDevice) -> DriverResult<()>,
) -> i32 {
    // SAFETY: forwarded from the caller.
    let cell = unsafe { cell(dev) };
    let outcome = catch_unwind(AssertUnwindSafe(|| op(cell.device.as_mut())));
    let err = match outcome {
        Ok(Ok(())) => return status::OK,
        Ok(Err(err)) if err.code == status::OK => DriverError::new(status::ERR, err.message),
        Ok(Err(err)) => err,
        Err(_) => {
            tracing::error!("driver call panicked");
            DriverError::new(status::DRIVER_PANIC, "Driver panicked")
        }
    };
    let code = err.code;
    cell.last_error = Some(err);
    code
}

/// Run an infallible driver query; a panic yields `R::default()`.
///
/// # Safety
///
/// `dev` must be a live handle produced by [`into_raw`].
unsafe fn query<R: Default>(dev: *mut RawDevice, op: impl FnOnce(&mut dyn DriverDevice) -> R) -> R {
    // SAFETY: forwarded from the caller.
    let cell = unsafe { cell(dev) };
    catch_unwind(AssertUnwindSafe(|| op(cell.device.as_mut()))).unwrap_or_else(|_| {
        tracing::error!("driver query panicked");
        R::default()
    })
}

fn put<T>(out: *mut T, value: T) -> DriverResult<()> {
    if out.is_null() {
        return Err(DriverError::new(status::ERR, "Null output pointer"));
    }
    // SAFETY: non-null out-pointers from the host point to writable storage.
    unsafe { out.write(value) };
    Ok(())
}

fn put_str(value: &str, buf: *mut c_char, cap: usize) -> DriverResult<()> {
    // SAFETY: the host passes a buffer of `cap` bytes.
    if unsafe { copy_to_buffer(value, buf, cap) } {
        Ok(())
    } else {
        Err(DriverError::new(
            status::BUFFER_TOO_SMALL,
            format!("Value of {} bytes does not fit in buffer", value.len()),
        ))
    }
}

// =============================================================================
// Generic Device Trampolines
// =============================================================================

static DEVICE_VTABLE: DeviceVTable = DeviceVTable {
    initialize: dev_initialize,
    shutdown: dev_shutdown,
    device_type: dev_device_type,
    busy: dev_busy,
    property_count: dev_property_count,
    property_name: dev_property_name,
    has_property: dev_has_property,
    get_property: dev_get_property,
    set_property: dev_set_property,
    property_read_only: dev_property_read_only,
    allowed_value_count: dev_allowed_value_count,
    allowed_value: dev_allowed_value,
    error_text: dev_error_text,
    query_interface: dev_query_interface,
};

unsafe extern "C" fn dev_initialize(dev: *mut RawDevice) -> i32 {
    unsafe { run(dev, |d| d.initialize()) }
}

unsafe extern "C" fn dev_shutdown(dev: *mut RawDevice) -> i32 {
    unsafe { run(dev, |d| d.shutdown()) }
}

unsafe extern "C" fn dev_device_type(dev: *mut RawDevice) -> u32 {
    unsafe { query(dev, |d| d.category().as_raw()) }
}

unsafe extern "C" fn dev_busy(dev: *mut RawDevice) -> bool {
    unsafe { query(dev, |d| d.busy()) }
}

unsafe extern "C" fn dev_property_count(dev: *mut RawDevice) -> u32 {
    unsafe { query(dev, |d| d.properties().len() as u32) }
}

unsafe extern "C" fn dev_property_name(
    dev: *mut RawDevice,
    index: u32,
    buf: *mut c_char,
    cap: usize,
) -> i32 {
    unsafe {
        run(dev, |d| {
            let name = d
                .properties()
                .names()
                .nth(index as usize)
                .map(str::to_string)
                .ok_or_else(|| {
                    DriverError::new(status::UNKNOWN_PROPERTY, format!("No property at index {}", index))
                })?;
            put_str(&name, buf, cap)
        })
    }
}

unsafe extern "C" fn dev_has_property(dev: *mut RawDevice, name: *const c_char) -> bool {
    let name = unsafe { read_c_str(name) };
    unsafe { query(dev, |d| d.properties().contains(&name)) }
}

unsafe extern "C" fn dev_get_property(
    dev: *mut RawDevice,
    name: *const c_char,
    buf: *mut c_char,
    cap: usize,
) -> i32 {
    let name = unsafe { read_c_str(name) };
    unsafe {
        run(dev, |d| {
            let value = d.get_property(&name)?;
            put_str(&value, buf, cap)
        })
    }
}

unsafe extern "C" fn dev_set_property(
    dev: *mut RawDevice,
    name: *const c_char,
    value: *const c_char,
) -> i32 {
    let name = unsafe { read_c_str(name) };
    let value = unsafe { read_c_str(value) };
    unsafe { run(dev, |d| d.set_property(&name, &value)) }
}

unsafe extern "C" fn dev_property_read_only(
    dev: *mut RawDevice,
    name: *const c_char,
    out: *mut bool,
) -> i32 {
    let name = unsafe { read_c_str(name) };
    unsafe { run(dev, |d| put(out, d.properties().is_read_only(&name)?)) }
}

unsafe extern "C" fn dev_allowed_value_count(
    dev: *mut RawDevice,
    name: *const c_char,
    out: *mut u32,
) -> i32 {
    let name = unsafe { read_c_str(name) };
    unsafe { run(dev, |d| put(out, d.properties().allowed(&name)?.len() as u32)) }
}

unsafe extern "C" fn dev_allowed_value(
    dev: *mut RawDevice,
    name: *const c_char,
    index: u32,
    buf: *mut c_char,
    cap: usize,
) -> i32 {
    let name = unsafe { read_c_str(name) };
    unsafe {
        run(dev, |d| {
            let allowed = d.properties().allowed(&name)?;
            let value = allowed.get(index as usize).ok_or_else(|| {
                DriverError::new(status::ERR, format!("No allowed value at index {}", index))
            })?;
            put_str(value, buf, cap)
        })
    }
}

unsafe extern "C" fn dev_error_text(
    dev: *mut RawDevice,
    code: i32,
    buf: *mut c_char,
    cap: usize,
) -> bool {
    let cell = unsafe { cell(dev) };
    let text = match &cell.last_error {
        Some(err) if err.code == code => err.message.clone(),
        _ => status::default_text(code),
    };
    unsafe { copy_to_buffer(&text, buf, cap) }
}

fn table<T>(vtable: &'static T) -> *const c_void {
    (vtable as *const T).cast()
}

unsafe extern "C" fn dev_query_interface(dev: *mut RawDevice, category: u32) -> *const c_void {
    let device = unsafe { cell(dev) }.device.as_mut();
    match DeviceCategory::from_raw(category) {
        Some(DeviceCategory::State) if device.as_state().is_some() => table(&STATE_VTABLE),
        Some(DeviceCategory::Shutter) if device.as_shutter().is_some() => table(&SHUTTER_VTABLE),
        Some(DeviceCategory::Stage) if device.as_stage().is_some() => table(&STAGE_VTABLE),
        Some(DeviceCategory::XyStage) if device.as_xy_stage().is_some() => table(&XY_STAGE_VTABLE),
        Some(DeviceCategory::Camera) if device.as_camera().is_some() => table(&CAMERA_VTABLE),
        Some(DeviceCategory::Serial) if device.as_serial().is_some() => table(&SERIAL_VTABLE),
        Some(DeviceCategory::AutoFocus) if device.as_auto_focus().is_some() => {
            table(&AUTO_FOCUS_VTABLE)
        }
        Some(DeviceCategory::ImageProcessor) if device.as_image_processor().is_some() => {
            table(&IMAGE_PROCESSOR_VTABLE)
        }
        Some(DeviceCategory::SignalIo) if device.as_signal_io().is_some() => {
            table(&SIGNAL_IO_VTABLE)
        }
        Some(DeviceCategory::Magnifier) if device.as_magnifier().is_some() => {
            table(&MAGNIFIER_VTABLE)
        }
        Some(DeviceCategory::Slm) if device.as_slm().is_some() => table(&SLM_VTABLE),
        Some(DeviceCategory::Hub) if device.as_hub().is_some() => table(&HUB_VTABLE),
        Some(DeviceCategory::Galvo) if device.as_galvo().is_some() => table(&GALVO_VTABLE),
        Some(DeviceCategory::Generic) | Some(DeviceCategory::Core) => table(&DEVICE_VTABLE),
        _ => std::ptr::null(),
    }
}

// =============================================================================
// Category Trampolines
// =============================================================================

macro_rules! category_runner {
    ($runner:ident, $accessor:ident, $driver:ident, $label:literal) => {
        unsafe fn $runner(
            dev: *mut RawDevice,
            op: impl FnOnce(&mut dyn $driver) -> DriverResult<()>,
        ) -> i32 {
            unsafe {
                run(dev, |d| match d.$accessor() {
                    Some(inner) => op(inner),
                    None => Err(DriverError::unsupported($label)),
                })
            }
        }
    };
}

category_runner!(run_state, as_state, StateDriver, "state");
category_runner!(run_shutter, as_shutter, ShutterDriver, "shutter");
category_runner!(run_stage, as_stage, StageDriver, "stage");
category_runner!(run_xy_stage, as_xy_stage, XyStageDriver, "xy_stage");
category_runner!(run_camera, as_camera, CameraDriver, "camera");
category_runner!(run_serial, as_serial, SerialDriver, "serial");
category_runner!(run_auto_focus, as_auto_focus, AutoFocusDriver, "auto_focus");
category_runner!(run_image_processor, as_image_processor, ImageProcessorDriver, "image_processor");
category_runner!(run_signal_io, as_signal_io, SignalIoDriver, "signal_io");
category_runner!(run_slm, as_slm, SlmDriver, "slm");
category_runner!(run_hub, as_hub, HubDriver, "hub");
category_runner!(run_galvo, as_galvo, GalvoDriver, "galvo");

// --- state ---

static STATE_VTABLE: StateVTable = StateVTable {
    get_position: state_get_position,
    set_position: state_set_position,
    number_of_positions: state_number_of_positions,
    set_gate_open: state_set_gate_open,
    get_gate_open: state_get_gate_open,
};

unsafe extern "C" fn state_get_position(dev: *mut RawDevice, out: *mut i64) -> i32 {
    unsafe { run_state(dev, |s| put(out, s.position()?)) }
}

unsafe extern "C" fn state_set_position(dev: *mut RawDevice, position: i64) -> i32 {
    unsafe { run_state(dev, |s| s.set_position(position)) }
}

unsafe extern "C" fn state_number_of_positions(dev: *mut RawDevice) -> u64 {
    unsafe { query(dev, |d| d.as_state().map(|s| s.number_of_positions()).unwrap_or(0)) }
}

unsafe extern "C" fn state_set_gate_open(dev: *mut RawDevice, open: bool) -> i32 {
    unsafe { run_state(dev, |s| s.set_gate_open(open)) }
}

unsafe extern "C" fn state_get_gate_open(dev: *mut RawDevice, out: *mut bool) -> i32 {
    unsafe { run_state(dev, |s| put(out, s.gate_open()?)) }
}

// --- shutter ---

static SHUTTER_VTABLE: ShutterVTable = ShutterVTable {
    set_open: shutter_set_open,
    get_open: shutter_get_open,
    fire: shutter_fire,
};

unsafe extern "C" fn shutter_set_open(dev: *mut RawDevice, open: bool) -> i32 {
    unsafe { run_shutter(dev, |s| s.set_open(open)) }
}

unsafe extern "C" fn shutter_get_open(dev: *mut RawDevice, out: *mut bool) -> i32 {
    unsafe { run_shutter(dev, |s| put(out, s.is_open()?)) }
}

unsafe extern "C" fn shutter_fire(dev: *mut RawDevice, delta_t_ms: f64) -> i32 {
    unsafe { run_shutter(dev, |s| s.fire(delta_t_ms)) }
}

// --- stage ---

static STAGE_VTABLE: StageVTable = StageVTable {
    set_position_um: stage_set_position_um,
    get_position_um: stage_get_position_um,
    set_relative_position_um: stage_set_relative_position_um,
    home: stage_home,
    stop: stage_stop,
    set_origin: stage_set_origin,
};

unsafe extern "C" fn stage_set_position_um(dev: *mut RawDevice, pos: f64) -> i32 {
    unsafe { run_stage(dev, |s| s.set_position_um(pos)) }
}

unsafe extern "C" fn stage_get_position_um(dev: *mut RawDevice, out: *mut f64) -> i32 {
    unsafe { run_stage(dev, |s| put(out, s.position_um()?)) }
}

unsafe extern "C" fn stage_set_relative_position_um(dev: *mut RawDevice, delta: f64) -> i32 {
    unsafe { run_stage(dev, |s| s.set_relative_position_um(delta)) }
}

unsafe extern "C" fn stage_home(dev: *mut RawDevice) -> i32 {
    unsafe { run_stage(dev, |s| s.home()) }
}

unsafe extern "C" fn stage_stop(dev: *mut RawDevice) -> i32 {
    unsafe { run_stage(dev, |s| s.stop()) }
}

unsafe extern "C" fn stage_set_origin(dev: *mut RawDevice) -> i32 {
    unsafe { run_stage(dev, |s| s.set_origin()) }
}

// --- xy stage ---

static XY_STAGE_VTABLE: XyStageVTable = XyStageVTable {
    set_position_um: xy_set_position_um,
    get_position_um: xy_get_position_um,
    home: xy_home,
    stop: xy_stop,
    set_origin: xy_set_origin,
};

unsafe extern "C" fn xy_set_position_um(dev: *mut RawDevice, x: f64, y: f64) -> i32 {
    unsafe { run_xy_stage(dev, |s| s.set_position_um(x, y)) }
}

unsafe extern "C" fn xy_get_position_um(dev: *mut RawDevice, x: *mut f64, y: *mut f64) -> i32 {
    unsafe {
        run_xy_stage(dev, |s| {
            let (px, py) = s.position_um()?;
            put(x, px)?;
            put(y, py)
        })
    }
}

unsafe extern "C" fn xy_home(dev: *mut RawDevice) -> i32 {
    unsafe { run_xy_stage(dev, |s| s.home()) }
}

unsafe extern "C" fn xy_stop(dev: *mut RawDevice) -> i32 {
    unsafe { run_xy_stage(dev, |s| s.stop()) }
}

unsafe extern "C" fn xy_set_origin(dev: *mut RawDevice) -> i32 {
    unsafe { run_xy_stage(dev, |s| s.set_origin()) }
}

// --- camera ---

static CAMERA_VTABLE: CameraVTable = CameraVTable {
    snap_image: camera_snap_image,
    image_width: camera_image_width,
    image_height: camera_image_height,
    bytes_per_pixel: camera_bytes_per_pixel,
    image_buffer: camera_image_buffer,
    get_exposure: camera_get_exposure,
    set_exposure: camera_set_exposure,
    get_binning: camera_get_binning,
    set_binning: camera_set_binning,
};

unsafe extern "C" fn camera_snap_image(dev: *mut RawDevice) -> i32 {
    unsafe { run_camera(dev, |c| c.snap_image()) }
}

unsafe extern "C" fn camera_image_width(dev: *mut RawDevice) -> u32 {
    unsafe { query(dev, |d| d.as_camera().map(|c| c.image_width()).unwrap_or(0)) }
}

unsafe extern "C" fn camera_image_height(dev: *mut RawDevice) -> u32 {
    unsafe { query(dev, |d| d.as_camera().map(|c| c.image_height()).unwrap_or(0)) }
}

unsafe extern "C" fn camera_bytes_per_pixel(dev: *mut RawDevice) -> u32 {
    unsafe { query(dev, |d| d.as_camera().map(|c| c.bytes_per_pixel()).unwrap_or(0)) }
}

unsafe extern "C" fn camera_image_buffer(dev: *mut RawDevice, buf: *mut u8, cap: usize) -> i32 {
    unsafe {
        run_camera(dev, |c| {
            let pixels = c.image_buffer();
            if buf.is_null() || pixels.len() > cap {
                return Err(DriverError::new(
                    status::BUFFER_TOO_SMALL,
                    format!("Image of {} bytes does not fit in {} bytes", pixels.len(), cap),
                ));
            }
            std::ptr::copy_nonoverlapping(pixels.as_ptr(), buf, pixels.len());
            Ok(())
        })
    }
}

unsafe extern "C" fn camera_get_exposure(dev: *mut RawDevice) -> f64 {
    unsafe { query(dev, |d| d.as_camera().map(|c| c.exposure_ms()).unwrap_or(0.0)) }
}

unsafe extern "C" fn camera_set_exposure(dev: *mut RawDevice, exposure_ms: f64) -> i32 {
    unsafe { run_camera(dev, |c| c.set_exposure_ms(exposure_ms)) }
}

unsafe extern "C" fn camera_get_binning(dev: *mut RawDevice) -> i32 {
    unsafe { query(dev, |d| d.as_camera().map(|c| c.binning()).unwrap_or(0)) }
}

unsafe extern "C" fn camera_set_binning(dev: *mut RawDevice, binning: i32) -> i32 {
    unsafe { run_camera(dev, |c| c.set_binning(binning)) }
}

// --- serial ---

static SERIAL_VTABLE: SerialVTable = SerialVTable {
    set_command: serial_set_command,
    get_answer: serial_get_answer,
    write: serial_write,
    read: serial_read,
    purge: serial_purge,
};

unsafe extern "C" fn serial_set_command(
    dev: *mut RawDevice,
    command: *const c_char,
    terminator: *const c_char,
) -> i32 {
    let command = unsafe { read_c_str(command) };
    let terminator = unsafe { read_c_str(terminator) };
    unsafe { run_serial(dev, |s| s.set_command(&command, &terminator)) }
}

unsafe extern "C" fn serial_get_answer(
    dev: *mut RawDevice,
    buf: *mut c_char,
    cap: usize,
    terminator: *const c_char,
) -> i32 {
    let terminator = unsafe { read_c_str(terminator) };
    unsafe {
        run_serial(dev, |s| {
            let answer = s.get_answer(&terminator)?;
            put_str(&answer, buf, cap)
        })
    }
}

unsafe extern "C" fn serial_write(dev: *mut RawDevice, data: *const u8, len: usize) -> i32 {
    let bytes: &[u8] = if data.is_null() || len == 0 {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(data, len) }
    };
    unsafe { run_serial(dev, |s| s.write(bytes)) }
}

unsafe extern "C" fn serial_read(
    dev: *mut RawDevice,
    buf: *mut u8,
    cap: usize,
    read: *mut usize,
) -> i32 {
    unsafe {
        run_serial(dev, |s| {
            let target: &mut [u8] = if buf.is_null() || cap == 0 {
                &mut []
            } else {
                std::slice::from_raw_parts_mut(buf, cap)
            };
            let count = s.read(target)?;
            put(read, count)
        })
    }
}

unsafe extern "C" fn serial_purge(dev: *mut RawDevice) -> i32 {
    unsafe { run_serial(dev, |s| s.purge()) }
}

// --- auto focus ---

static AUTO_FOCUS_VTABLE: AutoFocusVTable = AutoFocusVTable {
    set_continuous_focusing: af_set_continuous_focusing,
    get_continuous_focusing: af_get_continuous_focusing,
    is_continuous_focus_locked: af_is_continuous_focus_locked,
    full_focus: af_full_focus,
    incremental_focus: af_incremental_focus,
    get_offset: af_get_offset,
    set_offset: af_set_offset,
};

unsafe extern "C" fn af_set_continuous_focusing(dev: *mut RawDevice, on: bool) -> i32 {
    unsafe { run_auto_focus(dev, |a| a.set_continuous_focusing(on)) }
}

unsafe extern "C" fn af_get_continuous_focusing(dev: *mut RawDevice, out: *mut bool) -> i32 {
    unsafe { run_auto_focus(dev, |a| put(out, a.continuous_focusing()?)) }
}

unsafe extern "C" fn af_is_continuous_focus_locked(dev: *mut RawDevice) -> bool {
    unsafe {
        query(dev, |d| {
            d.as_auto_focus()
                .map(|a| a.is_continuous_focus_locked())
                .unwrap_or(false)
        })
    }
}

unsafe extern "C" fn af_full_focus(dev: *mut RawDevice) -> i32 {
    unsafe { run_auto_focus(dev, |a| a.full_focus()) }
}

unsafe extern "C" fn af_incremental_focus(dev: *mut RawDevice) -> i32 {
    unsafe { run_auto_focus(dev, |a| a.incremental_focus()) }
}

unsafe extern "C" fn af_get_offset(dev: *mut RawDevice, out: *mut f64) -> i32 {
    unsafe { run_auto_focus(dev, |a| put(out, a.offset()?)) }
}

unsafe extern "C" fn af_set_offset(dev: *mut RawDevice, offset: f64) -> i32 {
    unsafe { run_auto_focus(dev, |a| a.set_offset(offset)) }
}

// --- image processor ---

static IMAGE_PROCESSOR_VTABLE: ImageProcessorVTable = ImageProcessorVTable {
    process: processor_process,
};

unsafe extern "C" fn processor_process(
    dev: *mut RawDevice,
    buf: *mut u8,
    width: u32,
    height: u32,
    bytes_per_pixel: u32,
) -> i32 {
    let len = width as usize * height as usize * bytes_per_pixel as usize;
    unsafe {
        run_image_processor(dev, |p| {
            if buf.is_null() {
                return Err(DriverError::new(status::ERR, "Null image buffer"));
            }
            let image = std::slice::from_raw_parts_mut(buf, len);
            p.process(image, width, height, bytes_per_pixel)
        })
    }
}

// --- signal io ---

static SIGNAL_IO_VTABLE: SignalIoVTable = SignalIoVTable {
    set_signal: signal_set_signal,
    get_signal: signal_get_signal,
    set_gate_open: signal_set_gate_open,
    get_gate_open: signal_get_gate_open,
    get_limits: signal_get_limits,
};

unsafe extern "C" fn signal_set_signal(dev: *mut RawDevice, volts: f64) -> i32 {
    unsafe { run_signal_io(dev, |s| s.set_signal(volts)) }
}

unsafe extern "C" fn signal_get_signal(dev: *mut RawDevice, out: *mut f64) -> i32 {
    unsafe { run_signal_io(dev, |s| put(out, s.signal()?)) }
}

unsafe extern "C" fn signal_set_gate_open(dev: *mut RawDevice, open: bool) -> i32 {
    unsafe { run_signal_io(dev, |s| s.set_gate_open(open)) }
}

unsafe extern "C" fn signal_get_gate_open(dev: *mut RawDevice, out: *mut bool) -> i32 {
    unsafe { run_signal_io(dev, |s| put(out, s.gate_open()?)) }
}

unsafe extern "C" fn signal_get_limits(dev: *mut RawDevice, min: *mut f64, max: *mut f64) -> i32 {
    unsafe {
        run_signal_io(dev, |s| {
            let (low, high) = s.limits()?;
            put(min, low)?;
            put(max, high)
        })
    }
}

// --- magnifier ---

static MAGNIFIER_VTABLE: MagnifierVTable = MagnifierVTable {
    get_magnification: magnifier_get_magnification,
};

unsafe extern "C" fn magnifier_get_magnification(dev: *mut RawDevice) -> f64 {
    unsafe { query(dev, |d| d.as_magnifier().map(|m| m.magnification()).unwrap_or(0.0)) }
}

// --- slm ---

static SLM_VTABLE: SlmVTable = SlmVTable {
    set_image: slm_set_image,
    display_image: slm_display_image,
    width: slm_width,
    height: slm_height,
    bytes_per_pixel: slm_bytes_per_pixel,
    get_exposure: slm_get_exposure,
    set_exposure: slm_set_exposure,
};

unsafe extern "C" fn slm_set_image(dev: *mut RawDevice, data: *const u8, len: usize) -> i32 {
    let pixels: &[u8] = if data.is_null() || len == 0 {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(data, len) }
    };
    unsafe { run_slm(dev, |s| s.set_image(pixels)) }
}

unsafe extern "C" fn slm_display_image(dev: *mut RawDevice) -> i32 {
    unsafe { run_slm(dev, |s| s.display_image()) }
}

unsafe extern "C" fn slm_width(dev: *mut RawDevice) -> u32 {
    unsafe { query(dev, |d| d.as_slm().map(|s| s.width()).unwrap_or(0)) }
}

unsafe extern "C" fn slm_height(dev: *mut RawDevice) -> u32 {
    unsafe { query(dev, |d| d.as_slm().map(|s| s.height()).unwrap_or(0)) }
}

unsafe extern "C" fn slm_bytes_per_pixel(dev: *mut RawDevice) -> u32 {
    unsafe { query(dev, |d| d.as_slm().map(|s| s.bytes_per_pixel()).unwrap_or(0)) }
}

unsafe extern "C" fn slm_get_exposure(dev: *mut RawDevice) -> f64 {
    unsafe { query(dev, |d| d.as_slm().map(|s| s.exposure_ms()).unwrap_or(0.0)) }
}

unsafe extern "C" fn slm_set_exposure(dev: *mut RawDevice, exposure_ms: f64) -> i32 {
    unsafe { run_slm(dev, |s| s.set_exposure_ms(exposure_ms)) }
}

// --- hub ---

static HUB_VTABLE: HubVTable = HubVTable {
    detect_installed_devices: hub_detect_installed_devices,
    installed_device_count: hub_installed_device_count,
    installed_device_name: hub_installed_device_name,
};

unsafe extern "C" fn hub_detect_installed_devices(dev: *mut RawDevice) -> i32 {
    unsafe { run_hub(dev, |h| h.detect_installed_devices()) }
}

unsafe extern "C" fn hub_installed_device_count(dev: *mut RawDevice) -> u32 {
    unsafe {
        query(dev, |d| {
            d.as_hub()
                .map(|h| h.installed_devices().len() as u32)
                .unwrap_or(0)
        })
    }
}

unsafe extern "C" fn hub_installed_device_name(
    dev: *mut RawDevice,
    index: u32,
    buf: *mut c_char,
    cap: usize,
) -> i32 {
    unsafe {
        run_hub(dev, |h| {
            let name = h.installed_devices().get(index as usize).ok_or_else(|| {
                DriverError::new(status::ERR, format!("No installed device at index {}", index))
            })?;
            put_str(name, buf, cap)
        })
    }
}

// --- galvo ---

static GALVO_VTABLE: GalvoVTable = GalvoVTable {
    point_and_fire: galvo_point_and_fire,
    set_position: galvo_set_position,
    get_position: galvo_get_position,
    set_illumination_state: galvo_set_illumination_state,
    get_x_range: galvo_get_x_range,
    get_y_range: galvo_get_y_range,
};

unsafe extern "C" fn galvo_point_and_fire(
    dev: *mut RawDevice,
    x: f64,
    y: f64,
    duration_us: f64,
) -> i32 {
    unsafe { run_galvo(dev, |g| g.point_and_fire(x, y, duration_us)) }
}

unsafe extern "C" fn galvo_set_position(dev: *mut RawDevice, x: f64, y: f64) -> i32 {
    unsafe { run_galvo(dev, |g| g.set_position(x, y)) }
}

unsafe extern "C" fn galvo_get_position(dev: *mut RawDevice, x: *mut f64, y: *mut f64) -> i32 {
    unsafe {
        run_galvo(dev, |g| {
            let (px, py) = g.position()?;
            put(x, px)?;
            put(y, py)
        })
    }
}

unsafe extern "C" fn galvo_set_illumination_state(dev: *mut RawDevice, on: bool) -> i32 {
    unsafe { run_galvo(dev, |g| g.set_illumination_state(on)) }
}

unsafe extern "C" fn galvo_get_x_range(dev: *mut RawDevice, min: *mut f64, max: *mut f64) -> i32 {
    unsafe {
        run_galvo(dev, |g| {
            let (low, high) = g.x_range();
            put(min, low)?;
            put(max, high)
        })
    }
}

unsafe extern "C" fn galvo_get_y_range(dev: *mut RawDevice, min: *mut f64, max: *mut f64) -> i32 {
    unsafe {
        run_galvo(dev, |g| {
            let (low, high) = g.y_range();
            put(min, low)?;
            put(max, high)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::{string_from_buffer, MAX_STR_LEN};
    use crate::driver::PropertyTable;
    use std::ffi::CString;

    struct Lamp {
        props: PropertyTable,
        open: bool,
    }

    impl DriverDevice for Lamp {
        fn category(&self) -> DeviceCategory {
            DeviceCategory::Shutter
        }
        fn properties(&self) -> &PropertyTable {
            &self.props
        }
        fn properties_mut(&mut self) -> &mut PropertyTable {
            &mut self.props
        }
        fn as_shutter(&mut self) -> Option<&mut dyn ShutterDriver> {
            Some(self)
        }
    }

    impl ShutterDriver for Lamp {
        fn set_open(&mut self, open: bool) -> DriverResult<()> {
            if open && self.props.get("Interlock").as_deref() == Ok("Engaged") {
                return Err(DriverError::new(status::DRIVER_SPECIFIC, "Interlock engaged"));
            }
            self.open = open;
            Ok(())
        }
        fn is_open(&mut self) -> DriverResult<bool> {
            Ok(self.open)
        }
    }

    struct LampAdapter;

    impl AdapterDefinition for LampAdapter {
        const DEVICES: &'static [DeviceDescriptor] = &[DeviceDescriptor {
            name: "Lamp",
            category: DeviceCategory::Shutter,
            description: "Transmitted light shutter",
        }];

        fn create_device(name: &str) -> Option<Box<dyn DriverDevice>> {
            (name == "Lamp").then(|| {
                let mut props = PropertyTable::new();
                props
                    .define("Interlock", "Released")
                    .allowed_values(["Released", "Engaged"]);
                Box::new(Lamp { props, open: false }) as Box<dyn DriverDevice>
            })
        }
    }

    fn vtable(dev: *mut RawDevice) -> &'static DeviceVTable {
        unsafe { &*(*dev).vtable }
    }

    #[test]
    fn module_table_enumerates_devices() {
        let eps = entry_points::<LampAdapter>();
        unsafe {
            assert_eq!((eps.abi_version)(), ABI_VERSION);
            assert_eq!((eps.device_count)(), 1);
            let mut buf = vec![0 as c_char; MAX_STR_LEN];
            assert!((eps.device_name)(0, buf.as_mut_ptr(), buf.len()));
            assert_eq!(string_from_buffer(&buf), "Lamp");
            assert!(!(eps.device_name)(1, buf.as_mut_ptr(), buf.len()));
            let name = CString::new("Lamp").unwrap();
            assert_eq!((eps.device_type)(name.as_ptr()), DeviceCategory::Shutter.as_raw());
            let unknown = CString::new("Nope").unwrap();
            assert_eq!((eps.device_type)(unknown.as_ptr()), 0);
            assert!((eps.create_device)(unknown.as_ptr()).is_null());
        }
    }

    #[test]
    fn driver_error_text_is_reported_for_matching_code() {
        let eps = entry_points::<LampAdapter>();
        let name = CString::new("Lamp").unwrap();
        unsafe {
            let dev = (eps.create_device)(name.as_ptr());
            assert!(!dev.is_null());
            let vt = vtable(dev);

            let prop = CString::new("Interlock").unwrap();
            let value = CString::new("Engaged").unwrap();
            assert_eq!((vt.set_property)(dev, prop.as_ptr(), value.as_ptr()), status::OK);

            let shutter = &*((vt.query_interface)(dev, DeviceCategory::Shutter.as_raw())
                as *const ShutterVTable);
            let code = (shutter.set_open)(dev, true);
            assert_eq!(code, status::DRIVER_SPECIFIC);

            let mut buf = vec![0 as c_char; MAX_STR_LEN];
            assert!((vt.error_text)(dev, code, buf.as_mut_ptr(), buf.len()));
            assert_eq!(string_from_buffer(&buf), "Interlock engaged");

            assert!((vt.query_interface)(dev, DeviceCategory::Camera.as_raw()).is_null());
            (eps.delete_device)(dev);
        }
    }

    #[test]
    fn get_property_reports_small_buffer() {
        let eps = entry_points::<LampAdapter>();
        let name = CString::new("Lamp").unwrap();
        unsafe {
            let dev = (eps.create_device)(name.as_ptr());
            let vt = vtable(dev);
            let prop = CString::new("Interlock").unwrap();
            let mut tiny = [0 as c_char; 4];
            let code = (vt.get_property)(dev, prop.as_ptr(), tiny.as_mut_ptr(), tiny.len());
            assert_eq!(code, status::BUFFER_TOO_SMALL);
            (eps.delete_device)(dev);
        }
    }
}
