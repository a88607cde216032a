//! Single-axis stages (focus drives, piezo Z).

#![allow(unsafe_code)]

use crate::error::AdapterResult;
use crate::instance::Call;
use daq_adapter_api::abi::StageVTable;

narrowed_device!(
    /// Single-axis stage. Positions are in micrometres.
    StageDevice,
    StageVTable
);

impl StageDevice {
    /// Absolute move.
    pub fn set_position_um(&self, position: f64) -> AdapterResult<()> {
        let _span = self.instance.loggers().device.enter();
        tracing::debug!(position, "move stage");
        self.instance
            .invoke(Call::op_with("set_position_um", &position), |_, dev| unsafe {
                (self.vtable.set_position_um)(dev, position)
            })
    }

    /// Current position.
    pub fn position_um(&self) -> AdapterResult<f64> {
        let mut position = 0.0;
        self.instance.invoke(Call::op("position_um"), |_, dev| unsafe {
            (self.vtable.get_position_um)(dev, &mut position)
        })?;
        Ok(position)
    }

    /// Relative move.
    pub fn set_relative_position_um(&self, delta: f64) -> AdapterResult<()> {
        self.instance.invoke(
            Call::op_with("set_relative_position_um", &delta),
            |_, dev| unsafe { (self.vtable.set_relative_position_um)(dev, delta) },
        )
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
