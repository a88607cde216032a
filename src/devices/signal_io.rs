#![allow(unsafe_code)]

use crate::error::AdapterResult;
use crate::instance::Call;
use daq_adapter_api::abi::SignalIoVTable;

narrowed_device!(
    /// Analog or digital I/O line. Levels are in volts.
    SignalIoDevice,
    SignalIoVTable
);

impl SignalIoDevice {
    /// Set the output level.
    pub fn set_signal(&self, volts: f64) -> AdapterResult<()> {
        self.instance
            .invoke(Call::op_with("set_signal", &volts), |_, dev| unsafe {
                (self.vtable.set_signal)(dev, volts)
            })
    }

    /// Current level.
    pub fn signal(&self) -> AdapterResult<f64> {
        let mut volts = 0.0;
        self.instance.invoke(Call::op("signal"), |_, dev| unsafe {
            (self.vtable.get_signal)(dev, &mut volts)
        })?;
        Ok(volts)
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

    /// Allowed output range as (min, max).
    pub fn limits(&self) -> AdapterResult<(f64, f64)> {
        let (mut min, mut max) = (0.0, 0.0);
        self.instance.invoke(Call::op("limits"), |_, dev| unsafe {
            (self.vtable.get_limits)(dev, &mut min, &mut max)
        })?;
        Ok((min, max))
    }
}
