//! Typed devices, one per category.
//!
//! Every typed device wraps a [`DeviceInstance`] and the category table it was
//! narrowed to at construction. The closed set of categories is gathered in
//! [`TypedDevice`], which implements [`Device`] through `enum_dispatch`.
//!
//! ```rust,ignore
//! let device = module.create_device(ControllerRef::detached(), "Wheel", "Wheel", loggers)?;
//! let wheel = device.as_state().ok_or_else(|| anyhow!("not a state device"))?;
//! wheel.set_position(3)?;
//! ```

/// Declare a typed device that narrows to `$vtable` at construction.
macro_rules! narrowed_device {
    ($(#[$meta:meta])* $name:ident, $vtable:ty) => {
        $(#[$meta])*
        pub struct $name {
            instance: $crate::instance::DeviceInstance,
            vtable: $crate::guard::Interface<$vtable>,
        }

        impl $name {
            pub(crate) fn new(
                instance: $crate::instance::DeviceInstance,
            ) -> $crate::error::AdapterResult<Self> {
                let vtable = instance.narrow::<$vtable>()?;
                Ok(Self { instance, vtable })
            }
        }

        impl $crate::devices::Device for $name {
            fn instance(&self) -> &$crate::instance::DeviceInstance {
                &self.instance
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.instance).finish()
            }
        }
    };
}

mod autofocus;
mod camera;
mod galvo;
mod generic;
mod hub;
mod image_processor;
mod magnifier;
mod serial;
mod shutter;
mod signal_io;
mod slm;
mod stage;
mod state;
mod xy_stage;

pub use autofocus::AutoFocusDevice;
pub use camera::CameraDevice;
pub use galvo::GalvoDevice;
pub use generic::{CoreDevice, GenericDevice};
pub use hub::HubDevice;
pub use image_processor::ImageProcessorDevice;
pub use magnifier::MagnifierDevice;
pub use serial::SerialDevice;
pub use shutter::ShutterDevice;
pub use signal_io::SignalIoDevice;
pub use slm::SlmDevice;
pub use stage::StageDevice;
pub use state::StateDevice;
pub use xy_stage::XyStageDevice;

use crate::controller::ControllerRef;
use crate::error::AdapterResult;
use crate::instance::DeviceInstance;
use crate::module::AdapterModule;
use daq_adapter_api::abi::DeviceCategory;
use enum_dispatch::enum_dispatch;
use std::sync::Arc;

/// Behaviour shared by every typed device.
///
/// Implementors only provide [`Device::instance`]; the generic protocol is
/// forwarded to it.
#[enum_dispatch]
pub trait Device {
    /// The generic instance behind this device.
    fn instance(&self) -> &DeviceInstance;

    /// Controller-visible label.
    fn label(&self) -> &str {
        self.instance().label()
    }

    /// Device category.
    fn category(&self) -> DeviceCategory {
        self.instance().category()
    }

    /// Module that created this device.
    fn adapter_module(&self) -> Arc<AdapterModule> {
        self.instance().adapter_module()
    }

    /// Back-reference to the controller.
    fn controller(&self) -> &ControllerRef {
        self.instance().controller()
    }

    /// See [`DeviceInstance::property_names`].
    fn property_names(&self) -> AdapterResult<Vec<String>> {
        self.instance().property_names()
    }

    /// See [`DeviceInstance::get_property`].
    fn get_property(&self, name: &str) -> AdapterResult<String> {
        self.instance().get_property(name)
    }

    /// See [`DeviceInstance::set_property`].
    fn set_property(&self, name: &str, value: &str) -> AdapterResult<()> {
        self.instance().set_property(name, value)
    }

    /// See [`DeviceInstance::has_property`].
    fn has_property(&self, name: &str) -> bool {
        self.instance().has_property(name)
    }

    /// See [`DeviceInstance::initialize`].
    fn initialize(&self) -> AdapterResult<()> {
        self.instance().initialize()
    }

    /// See [`DeviceInstance::shutdown`].
    fn shutdown(&self) -> AdapterResult<()> {
        self.instance().shutdown()
    }

    /// See [`DeviceInstance::busy`].
    fn busy(&self) -> bool {
        self.instance().busy()
    }
}

/// Any device created by an adapter module.
#[enum_dispatch(Device)]
#[derive(Debug)]
pub enum TypedDevice {
    /// Image sensor
    Camera(CameraDevice),
    /// Light-path shutter
    Shutter(ShutterDevice),
    /// Discrete-position device
    State(StateDevice),
    /// Single-axis stage
    Stage(StageDevice),
    /// Two-axis stage
    XyStage(XyStageDevice),
    /// Serial port
    Serial(SerialDevice),
    /// Properties only
    Generic(GenericDevice),
    /// Focus device
    AutoFocus(AutoFocusDevice),
    /// Controller pseudo-device
    Core(CoreDevice),
    /// In-line image transform
    ImageProcessor(ImageProcessorDevice),
    /// Analog or digital line
    SignalIo(SignalIoDevice),
    /// Magnification changer
    Magnifier(MagnifierDevice),
    /// Spatial light modulator
    Slm(SlmDevice),
    /// Peripheral hub
    Hub(HubDevice),
    /// Galvanometer scanner
    Galvo(GalvoDevice),
}

/// Build the typed device for the instance's category.
///
/// On failure the instance is dropped, which deletes the raw handle.
pub(crate) fn construct(instance: DeviceInstance) -> AdapterResult<TypedDevice> {
    Ok(match instance.category() {
        DeviceCategory::Camera => CameraDevice::new(instance)?.into(),
        DeviceCategory::Shutter => ShutterDevice::new(instance)?.into(),
        DeviceCategory::State => StateDevice::new(instance)?.into(),
        DeviceCategory::Stage => StageDevice::new(instance)?.into(),
        DeviceCategory::XyStage => XyStageDevice::new(instance)?.into(),
        DeviceCategory::Serial => SerialDevice::new(instance)?.into(),
        DeviceCategory::Generic => GenericDevice::new(instance)?.into(),
        DeviceCategory::AutoFocus => AutoFocusDevice::new(instance)?.into(),
        DeviceCategory::Core => CoreDevice::new(instance)?.into(),
        DeviceCategory::ImageProcessor => ImageProcessorDevice::new(instance)?.into(),
        DeviceCategory::SignalIo => SignalIoDevice::new(instance)?.into(),
        DeviceCategory::Magnifier => MagnifierDevice::new(instance)?.into(),
        DeviceCategory::Slm => SlmDevice::new(instance)?.into(),
        DeviceCategory::Hub => HubDevice::new(instance)?.into(),
        DeviceCategory::Galvo => GalvoDevice::new(instance)?.into(),
    })
}

/// Byte size of a `width` x `height` frame, `None` if it overflows `usize`.
pub(crate) fn frame_len(width: u32, height: u32, bytes_per_pixel: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(bytes_per_pixel as usize)
}

macro_rules! typed_accessors {
    ($($variant:ident => $as:ident, $into:ident, $ty:ty;)*) => {
        impl TypedDevice {
            $(
                #[doc = concat!("Borrow as [`", stringify!($ty), "`] if this is one.")]
                pub fn $as(&self) -> Option<&$ty> {
                    match self {
                        TypedDevice::$variant(device) => Some(device),
                        _ => None,
                    }
                }

                #[doc = concat!("Convert into [`", stringify!($ty), "`], or give the device back.")]
                pub fn $into(self) -> Result<$ty, TypedDevice> {
                    match self {
                        TypedDevice::$variant(device) => Ok(device),
                        other => Err(other),
                    }
                }
            )*
        }
    };
}

typed_accessors! {
    Camera => as_camera, into_camera, CameraDevice;
    Shutter => as_shutter, into_shutter, ShutterDevice;
    State => as_state, into_state, StateDevice;
    Stage => as_stage, into_stage, StageDevice;
    XyStage => as_xy_stage, into_xy_stage, XyStageDevice;
    Serial => as_serial, into_serial, SerialDevice;
    Generic => as_generic, into_generic, GenericDevice;
    AutoFocus => as_auto_focus, into_auto_focus, AutoFocusDevice;
    Core => as_core, into_core, CoreDevice;
    ImageProcessor => as_image_processor, into_image_processor, ImageProcessorDevice;
    SignalIo => as_signal_io, into_signal_io, SignalIoDevice;
    Magnifier => as_magnifier, into_magnifier, MagnifierDevice;
    Slm => as_slm, into_slm, SlmDevice;
    Hub => as_hub, into_hub, HubDevice;
    Galvo => as_galvo, into_galvo, GalvoDevice;
}

#[cfg(test)]
mod tests {
    use super::frame_len;

    #[test]
    fn frame_len_rejects_overflow() {
        assert_eq!(frame_len(64, 48, 2), Some(6144));
        assert_eq!(frame_len(0, u32::MAX, 8), Some(0));
        assert_eq!(frame_len(u32::MAX, u32::MAX, 8), None);
    }
}
