#![allow(unsafe_code)]

use crate::error::AdapterResult;
use crate::instance::Call;
use daq_adapter_api::abi::ShutterVTable;

narrowed_device!(
    /// Light-path shutter.
    ShutterDevice,
    ShutterVTable
);

impl ShutterDevice {
    /// Open or close.
    pub fn set_open(&self, open: bool) -> AdapterResult<()> {
        let _span = self.instance.loggers().device.enter();
        tracing::debug!(open, "set shutter");
        self.instance.invoke(Call::op("set_open"), |_, dev| unsafe {
            (self.vtable.set_open)(dev, open)
        })
    }

    /// Whether the shutter is open.
    pub fn is_open(&self) -> AdapterResult<bool> {
        let mut open = false;
        self.instance.invoke(Call::op("is_open"), |_, dev| unsafe {
            (self.vtable.get_open)(dev, &mut open)
        })?;
        Ok(open)
    }

    /// Open for `delta_t_ms` milliseconds; blocks until the driver returns.
    pub fn fire(&self, delta_t_ms: f64) -> AdapterResult<()> {
        self.instance.invoke(Call::op_with("fire", &delta_t_ms), |_, dev| unsafe {
            (self.vtable.fire)(dev, delta_t_ms)
        })
    }
}
