//! Hubs: one physical connection shared by several peripherals.
//!
//! The hub only reports which peripherals it found. Creating those
//! peripherals, and wiring them to their parent, is up to the controller.

#![allow(unsafe_code)]

use crate::error::AdapterResult;
use crate::instance::Call;
use daq_adapter_api::abi::{string_from_buffer, HubVTable, MAX_STR_LEN};
use std::ffi::c_char;

narrowed_device!(
    /// Parent device of peripherals sharing one connection.
    HubDevice,
    HubVTable
);

impl HubDevice {
    /// Scan the connection for attached peripherals.
    pub fn detect_installed_devices(&self) -> AdapterResult<()> {
        let _span = self.instance.loggers().device.enter();
        tracing::debug!("detecting installed devices");
        self.instance
            .invoke(Call::op("detect_installed_devices"), |_, dev| unsafe {
                (self.vtable.detect_installed_devices)(dev)
            })
    }

    /// Device names found by the last detection, in driver order.
    pub fn installed_devices(&self) -> AdapterResult<Vec<String>> {
        let count = self
            .instance
            .query(|_, dev| unsafe { (self.vtable.installed_device_count)(dev) });
        let mut names = Vec::with_capacity(count as usize);
        let mut buf = vec![0 as c_char; MAX_STR_LEN];
        for index in 0..count {
            self.instance
                .invoke(Call::op("installed_device_name"), |_, dev| unsafe {
                    (self.vtable.installed_device_name)(dev, index, buf.as_mut_ptr(), buf.len())
                })?;
            names.push(string_from_buffer(&buf));
        }
        Ok(names)
    }
}
