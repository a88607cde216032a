#![allow(unsafe_code)]

use crate::error::AdapterResult;
use crate::instance::Call;
use daq_adapter_api::abi::XyStageVTable;

narrowed_device!(
    /// Two-axis stage. Positions are in micrometres.
    XyStageDevice,
    XyStageVTable
);

impl XyStageDevice {
    /// Absolute move to (`x`, `y`).
    pub fn set_position_um(&self, x: f64, y: f64) -> AdapterResult<()> {
        let _span = self.instance.loggers().device.enter();
        tracing::debug!(x, y, "move xy stage");
        self.instance.invoke(Call::op("set_position_um"), |_, dev| unsafe {
            (self.vtable.set_position_um)(dev, x, y)
        })
    }

    /// Current (x, y).
    pub fn position_um(&self) -> AdapterResult<(f64, f64)> {
        let (mut x, mut y) = (0.0, 0.0);
        self.instance.invoke(Call::op("position_um"), |_, dev| unsafe {
            (self.vtable.get_position_um)(dev, &mut x, &mut y)
        })?;
        Ok((x, y))
    }

    /// Run the homing sequence.
    pub fn home(&self) -> AdapterResult<()> {
        self.instance
            .invoke(Call::op("home"), |_, dev| unsafe { (self.vtable.home)(dev) })
    }

    /// Halt motion.
    pub fn stop(&self) -> AdapterResult<()> {
        self.instance
            .invoke(Call::op("stop"), |_, dev| unsafe { (self.vtable.stop)(dev) })
    }

    /// Define the current position as zero.
    pub fn set_origin(&self) -> AdapterResult<()> {
        self.instance.invoke(Call::op("set_origin"), |_, dev| unsafe {
            (self.vtable.set_origin)(dev)
        })
    }
}
