#![allow(unsafe_code)]

use crate::error::{AdapterError, AdapterResult};
use crate::instance::Call;
use daq_adapter_api::abi::ImageProcessorVTable;

narrowed_device!(
    /// In-line image transform applied to camera frames.
    ImageProcessorDevice,
    ImageProcessorVTable
);

impl ImageProcessorDevice {
    /// Transform `image` in place.
    ///
    /// `image` must hold exactly `width * height * bytes_per_pixel` bytes.
    pub fn process(
        &self,
        image: &mut [u8],
        width: u32,
        height: u32,
        bytes_per_pixel: u32,
    ) -> AdapterResult<()> {
        let expected = super::frame_len(width, height, bytes_per_pixel);
        if expected != Some(image.len()) {
            let message = match expected {
                Some(expected) => format!(
                    "{}x{}x{} image needs {} bytes",
                    width, height, bytes_per_pixel, expected
                ),
                None => format!(
                    "{}x{}x{} image does not fit in memory",
                    width, height, bytes_per_pixel
                ),
            };
            return Err(AdapterError::InvalidValue {
                label: self.instance.label().to_string(),
                property: "process".to_string(),
                value: format!("{} bytes", image.len()),
                message,
            });
        }
        self.instance.invoke(Call::op("process"), |_, dev| unsafe {
            (self.vtable.process)(dev, image.as_mut_ptr(), width, height, bytes_per_pixel)
        })
    }
}
