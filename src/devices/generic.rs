//! Devices with no category operations.

use crate::error::AdapterResult;
use crate::instance::DeviceInstance;
use daq_adapter_api::abi::DeviceVTable;

/// Device exposing properties only.
pub struct GenericDevice {
    instance: DeviceInstance,
}

/// Controller pseudo-device; same protocol as [`GenericDevice`].
pub struct CoreDevice {
    instance: DeviceInstance,
}

macro_rules! generic_device {
    ($name:ident) => {
        impl $name {
            pub(crate) fn new(instance: DeviceInstance) -> AdapterResult<Self> {
                // Narrowing must still succeed even though no table is kept.
                instance.narrow::<DeviceVTable>()?;
                Ok(Self { instance })
            }
        }

        impl super::Device for $name {
            fn instance(&self) -> &DeviceInstance {
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

generic_device!(GenericDevice);
generic_device!(CoreDevice);
