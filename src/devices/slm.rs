#![allow(unsafe_code)]

use crate::error::AdapterResult;
use crate::instance::Call;
use daq_adapter_api::abi::SlmVTable;

narrowed_device!(
    /// Spatial light modulator.
    SlmDevice,
    SlmVTable
);

impl SlmDevice {
    /// Load `pixels` into the device buffer without showing them.
    pub fn set_image(&self, pixels: &[u8]) -> AdapterResult<()> {
        self.instance.invoke(Call::op("set_image"), |_, dev| unsafe {
            (self.vtable.set_image)(dev, pixels.as_ptr(), pixels.len())
        })
    }

    /// Show the loaded image.
    pub fn display_image(&self) -> AdapterResult<()> {
        self.instance.invoke(Call::op("display_image"), |_, dev| unsafe {
            (self.vtable.display_image)(dev)
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.instance.query(|_, dev| unsafe { (self.vtable.width)(dev) })
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.instance.query(|_, dev| unsafe { (self.vtable.height)(dev) })
    }

    /// Bytes per pixel.
    pub fn bytes_per_pixel(&self) -> u32 {
        self.instance
            .query(|_, dev| unsafe { (self.vtable.bytes_per_pixel)(dev) })
    }

    /// Exposure in milliseconds.
    pub fn exposure_ms(&self) -> f64 {
        self.instance
            .query(|_, dev| unsafe { (self.vtable.get_exposure)(dev) })
    }

    /// Set exposure in milliseconds.
    pub fn set_exposure_ms(&self, exposure_ms: f64) -> AdapterResult<()> {
        self.instance
            .invoke(Call::op_with("set_exposure_ms", &exposure_ms), |_, dev| unsafe {
                (self.vtable.set_exposure)(dev, exposure_ms)
            })
    }
}
