//! Cameras.
//!
//! Only single-frame acquisition is exposed. The frame is copied out of the
//! driver into an owned buffer sized from the reported geometry.

#![allow(unsafe_code)]

use crate::error::{AdapterError, AdapterResult};
use crate::instance::Call;
use daq_adapter_api::abi::{status, CameraVTable};

narrowed_device!(
    /// Image sensor.
    CameraDevice,
    CameraVTable
);

impl CameraDevice {
    /// Expose and read out one frame; blocks for the exposure time.
    pub fn snap_image(&self) -> AdapterResult<()> {
        let _span = self.instance.loggers().device.enter();
        tracing::debug!("snap image");
        self.instance.invoke(Call::op("snap_image"), |_, dev| unsafe {
            (self.vtable.snap_image)(dev)
        })
    }

    /// Width in pixels.
    pub fn image_width(&self) -> u32 {
        self.instance
            .query(|_, dev| unsafe { (self.vtable.image_width)(dev) })
    }

    /// Height in pixels.
    pub fn image_height(&self) -> u32 {
        self.instance
            .query(|_, dev| unsafe { (self.vtable.image_height)(dev) })
    }

    /// Bytes per pixel.
    pub fn bytes_per_pixel(&self) -> u32 {
        self.instance
            .query(|_, dev| unsafe { (self.vtable.bytes_per_pixel)(dev) })
    }

    /// Copy of the last snapped frame.
    ///
    /// A reported geometry whose byte size does not fit in memory is a
    /// [`AdapterError::DeviceCommunication`] failure; nothing is allocated.
    pub fn image_buffer(&self) -> AdapterResult<Vec<u8>> {
        let (width, height, bpp) = (
            self.image_width(),
            self.image_height(),
            self.bytes_per_pixel(),
        );
        let oversized = || AdapterError::DeviceCommunication {
            label: self.instance.label().to_string(),
            code: status::ERR,
            message: format!("reported frame {}x{}x{} is too large", width, height, bpp),
        };
        let len = super::frame_len(width, height, bpp).ok_or_else(oversized)?;
        let mut pixels = Vec::new();
        pixels.try_reserve_exact(len).map_err(|_| oversized())?;
        pixels.resize(len, 0u8);
        self.instance.invoke(Call::op("image_buffer"), |_, dev| unsafe {
            (self.vtable.image_buffer)(dev, pixels.as_mut_ptr(), pixels.len())
        })?;
        Ok(pixels)
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

    /// Binning factor.
    pub fn binning(&self) -> i32 {
        self.instance
            .query(|_, dev| unsafe { (self.vtable.get_binning)(dev) })
    }

    /// Set binning factor.
    pub fn set_binning(&self, binning: i32) -> AdapterResult<()> {
        self.instance
            .invoke(Call::op_with("set_binning", &binning), |_, dev| unsafe {
                (self.vtable.set_binning)(dev, binning)
            })
    }
}
