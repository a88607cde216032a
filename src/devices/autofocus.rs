#![allow(unsafe_code)]

use crate::error::AdapterResult;
use crate::instance::Call;
use daq_adapter_api::abi::AutoFocusVTable;

narrowed_device!(
    /// Hardware focus lock or software autofocus.
    AutoFocusDevice,
    AutoFocusVTable
);

impl AutoFocusDevice {
    /// Enable or disable continuous focusing.
    pub fn set_continuous_focusing(&self, on: bool) -> AdapterResult<()> {
        self.instance
            .invoke(Call::op("set_continuous_focusing"), |_, dev| unsafe {
                (self.vtable.set_continuous_focusing)(dev, on)
            })
    }

    /// Whether continuous focusing is enabled.
    pub fn continuous_focusing(&self) -> AdapterResult<bool> {
        let mut on = false;
        self.instance
            .invoke(Call::op("continuous_focusing"), |_, dev| unsafe {
                (self.vtable.get_continuous_focusing)(dev, &mut on)
            })?;
        Ok(on)
    }

    /// Whether continuous focus is locked.
    pub fn is_continuous_focus_locked(&self) -> bool {
        self.instance
            .query(|_, dev| unsafe { (self.vtable.is_continuous_focus_locked)(dev) })
    }

    /// Full focus search.
    pub fn full_focus(&self) -> AdapterResult<()> {
        self.instance.invoke(Call::op("full_focus"), |_, dev| unsafe {
            (self.vtable.full_focus)(dev)
        })
    }

    /// Incremental focus search.
    pub fn incremental_focus(&self) -> AdapterResult<()> {
        self.instance
            .invoke(Call::op("incremental_focus"), |_, dev| unsafe {
                (self.vtable.incremental_focus)(dev)
            })
    }

    /// Focus offset.
    pub fn offset(&self) -> AdapterResult<f64> {
        let mut offset = 0.0;
        self.instance.invoke(Call::op("offset"), |_, dev| unsafe {
            (self.vtable.get_offset)(dev, &mut offset)
        })?;
        Ok(offset)
    }

    /// Set focus offset.
    pub fn set_offset(&self, offset: f64) -> AdapterResult<()> {
        self.instance
            .invoke(Call::op_with("set_offset", &offset), |_, dev| unsafe {
                (self.vtable.set_offset)(dev, offset)
            })
    }
}
