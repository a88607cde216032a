//! Serial ports exposed as devices.
//!
//! Other adapters address a port by its label; this wrapper gives the host
//! direct access for diagnostics.

#![allow(unsafe_code)]

use crate::error::{AdapterError, AdapterResult};
use crate::instance::Call;
use daq_adapter_api::abi::{string_from_buffer, SerialVTable, MAX_STR_LEN};
use std::ffi::{c_char, CString};

narrowed_device!(
    /// Serial communication port.
    SerialDevice,
    SerialVTable
);

impl SerialDevice {
    /// Send `command` followed by `terminator`.
    pub fn set_command(&self, command: &str, terminator: &str) -> AdapterResult<()> {
        let command_c = self.c_string(command)?;
        let terminator_c = self.c_string(terminator)?;
        let _span = self.instance.loggers().device.enter();
        tracing::trace!(command = %command, "serial command");
        self.instance.invoke(Call::op("set_command"), |_, dev| unsafe {
            (self.vtable.set_command)(dev, command_c.as_ptr(), terminator_c.as_ptr())
        })
    }

    /// Read one answer up to `terminator`, which is stripped.
    pub fn get_answer(&self, terminator: &str) -> AdapterResult<String> {
        let terminator_c = self.c_string(terminator)?;
        let mut buf = vec![0 as c_char; MAX_STR_LEN];
        self.instance.invoke(Call::op("get_answer"), |_, dev| unsafe {
            (self.vtable.get_answer)(dev, buf.as_mut_ptr(), buf.len(), terminator_c.as_ptr())
        })?;
        Ok(string_from_buffer(&buf))
    }

    /// Write raw bytes.
    pub fn write(&self, data: &[u8]) -> AdapterResult<()> {
        self.instance.invoke(Call::op("write"), |_, dev| unsafe {
            (self.vtable.write)(dev, data.as_ptr(), data.len())
        })
    }

    /// Read up to `max` raw bytes.
    pub fn read(&self, max: usize) -> AdapterResult<Vec<u8>> {
        let mut buf = vec![0u8; max];
        let mut count = 0usize;
        self.instance.invoke(Call::op("read"), |_, dev| unsafe {
            (self.vtable.read)(dev, buf.as_mut_ptr(), buf.len(), &mut count)
        })?;
        buf.truncate(count.min(max));
        Ok(buf)
    }

    /// Discard pending input.
    pub fn purge(&self) -> AdapterResult<()> {
        self.instance
            .invoke(Call::op("purge"), |_, dev| unsafe { (self.vtable.purge)(dev) })
    }

    fn c_string(&self, text: &str) -> AdapterResult<CString> {
        CString::new(text).map_err(|_| AdapterError::InvalidValue {
            label: self.instance.label().to_string(),
            property: "command".to_string(),
            value: text.escape_debug().to_string(),
            message: "text contains NUL".to_string(),
        })
    }
}
