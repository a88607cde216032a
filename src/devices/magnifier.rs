#![allow(unsafe_code)]

use daq_adapter_api::abi::MagnifierVTable;

narrowed_device!(
    /// Optical magnification changer.
    MagnifierDevice,
    MagnifierVTable
);

impl MagnifierDevice {
    /// Current magnification factor.
    pub fn magnification(&self) -> f64 {
        self.instance
            .query(|_, dev| unsafe { (self.vtable.get_magnification)(dev) })
    }
}
