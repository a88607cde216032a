//! Discrete-position devices: filter wheels, turrets, dichroic sliders.

#![allow(unsafe_code)]

use crate::error::AdapterResult;
use crate::instance::Call;
use daq_adapter_api::abi::StateVTable;

narrowed_device!(
    /// Device with a finite set of numbered positions and an optional gate.
    ///
    /// Positions are zero-based. Out-of-range positions are rejected by the
    /// driver and surface as [`crate::AdapterError::InvalidValue`].
    StateDevice,
    StateVTable
);

impl StateDevice {
    /// Current position.
    pub fn get_position(&self) -> AdapterResult<i64> {
        let mut position = 0i64;
        self.instance.invoke(Call::op("get_position"), |_, dev| unsafe {
            (self.vtable.get_position)(dev, &mut position)
        })?;
        Ok(position)
    }

    /// Move to `position`.
    pub fn set_position(&self, position: i64) -> AdapterResult<()> {
        let _span = self.instance.loggers().device.enter();
        tracing::debug!(position, "set position");
        self.instance
            .invoke(Call::op_with("set_position", &position), |_, dev| unsafe {
                (self.vtable.set_position)(dev, position)
            })
    }

    /// Number of positions.
    pub fn number_of_positions(&self) -> u64 {
        self.instance
            .query(|_, dev| unsafe { (self.vtable.number_of_positions)(dev) })
    }

    /// Open or close the gate.
    pub fn set_gate_open(&self, open: bool) -> AdapterResult<()> {
        self.instance.invoke(Call::op("set_gate_open"), |_, dev| unsafe {
            (self.vtable.set_gate_open)(dev, open)
        })
    }

    /// Gate state.
    pub fn gate_open(&self) -> AdapterResult<bool> {
        let mut open = false;
        self.instance.invoke(Call::op("gate_open"), |_, dev| unsafe {
            (self.vtable.get_gate_open)(dev, &mut open)
        })?;
        Ok(open)
    }
}
