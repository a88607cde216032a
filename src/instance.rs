//! State and protocol shared by every typed device.
//!
//! A [`DeviceInstance`] binds a controller-visible label to one raw device
//! handle. It owns the handle through a [`RawDeviceGuard`], keeps its module
//! loaded, and forwards every call to the driver under a per-instance lock.
//! Property values are never cached: each read and write reaches the driver.

#![allow(unsafe_code)]

use crate::controller::ControllerRef;
use crate::error::{AdapterError, AdapterResult};
use crate::guard::{Interface, RawDeviceGuard};
use crate::logging::DeviceLoggers;
use crate::module::AdapterModule;
use daq_adapter_api::abi::{
    status, string_from_buffer, DeviceCategory, DeviceVTable, RawDevice, MAX_STR_LEN,
};
use parking_lot::Mutex;
use std::ffi::{c_char, CString};
use std::fmt;
use std::sync::Arc;

/// What a forwarded call was about, for error reporting.
#[derive(Clone, Copy)]
pub(crate) enum Call<'a> {
    /// Property access, with the value being written if any.
    Property {
        name: &'a str,
        value: Option<&'a str>,
    },
    /// Category operation, with its argument rendered for messages.
    Operation {
        name: &'a str,
        value: Option<&'a dyn fmt::Display>,
    },
}

impl<'a> Call<'a> {
    pub(crate) fn op(name: &'a str) -> Self {
        Call::Operation { name, value: None }
    }

    pub(crate) fn op_with(name: &'a str, value: &'a dyn fmt::Display) -> Self {
        Call::Operation {
            name,
            value: Some(value),
        }
    }
}

/// Generic device: label, ownership and the property protocol.
pub struct DeviceInstance {
    guard: RawDeviceGuard,
    controller: ControllerRef,
    name: String,
    label: String,
    category: DeviceCategory,
    description: String,
    loggers: DeviceLoggers,
    lock: Mutex<()>,
}

/// Check a controller-supplied label.
///
/// Labels are non-empty, fit in one ABI string buffer, carry no control
/// characters and no surrounding whitespace.
pub fn validate_label(label: &str) -> AdapterResult<()> {
    let reason = if label.is_empty() {
        Some("label is empty")
    } else if label.len() >= MAX_STR_LEN {
        Some("label is too long")
    } else if label.chars().any(char::is_control) {
        Some("label contains control characters")
    } else if label.trim() != label {
        Some("label has leading or trailing whitespace")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(AdapterError::InvalidLabel {
            label: label.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

impl DeviceInstance {
    /// Bind a guarded handle to its label.
    ///
    /// Fails if the driver reports a category other than `category`; the guard
    /// is dropped on that path, which deletes the handle.
    pub(crate) fn new(
        guard: RawDeviceGuard,
        controller: ControllerRef,
        name: &str,
        label: &str,
        category: DeviceCategory,
        description: String,
        loggers: DeviceLoggers,
    ) -> AdapterResult<Self> {
        // SAFETY: the guard keeps the handle live.
        let reported = unsafe { (guard.vtable().device_type)(guard.as_ptr()) };
        if DeviceCategory::from_raw(reported) != Some(category) {
            let reported = DeviceCategory::from_raw(reported)
                .map(|c| c.to_string())
                .unwrap_or_else(|| format!("unknown tag {}", reported));
            return Err(AdapterError::creation(
                guard.module().name(),
                name,
                format!("device reports category {}, module advertises {}", reported, category),
            ));
        }

        Ok(Self {
            guard,
            controller,
            name: name.to_string(),
            label: label.to_string(),
            category,
            description,
            loggers,
            lock: Mutex::new(()),
        })
    }

    /// Narrow the handle to its category table.
    pub(crate) fn narrow<T: 'static>(&self) -> AdapterResult<Interface<T>> {
        let table = self
            .guard
            .query_interface(self.category.as_raw())
            .ok_or_else(|| {
                AdapterError::creation(
                    self.guard.module().name(),
                    &self.name,
                    format!("device does not provide the {} interface", self.category),
                )
            })?;
        // SAFETY: the module returned this table for our category tag, and tables
        // live in the module image, which `self.guard` keeps loaded.
        Ok(unsafe { Interface::from_raw(table) })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Controller-visible label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Advertised device name within its module.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Device category.
    pub fn category(&self) -> DeviceCategory {
        self.category
    }

    /// Description advertised by the module.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Module that created this device.
    pub fn adapter_module(&self) -> Arc<AdapterModule> {
        Arc::clone(self.guard.module())
    }

    /// Back-reference to the controller.
    pub fn controller(&self) -> &ControllerRef {
        &self.controller
    }

    /// Logging spans.
    pub fn loggers(&self) -> &DeviceLoggers {
        &self.loggers
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Bring the hardware online.
    pub fn initialize(&self) -> AdapterResult<()> {
        let _span = self.loggers.device.enter();
        tracing::debug!("initializing");
        self.invoke(Call::op("initialize"), |vt, dev| unsafe { (vt.initialize)(dev) })
    }

    /// Release the hardware. The handle itself is deleted on drop.
    pub fn shutdown(&self) -> AdapterResult<()> {
        let _span = self.loggers.device.enter();
        tracing::debug!("shutting down");
        self.invoke(Call::op("shutdown"), |vt, dev| unsafe { (vt.shutdown)(dev) })
    }

    /// Whether the driver reports an operation in progress.
    pub fn busy(&self) -> bool {
        self.query(|vt, dev| unsafe { (vt.busy)(dev) })
    }

    // =========================================================================
    // Property Protocol
    // =========================================================================

    /// Property names in driver order.
    pub fn property_names(&self) -> AdapterResult<Vec<String>> {
        let count = self.query(|vt, dev| unsafe { (vt.property_count)(dev) });
        let mut names = Vec::with_capacity(count as usize);
        let mut buf = vec![0 as c_char; MAX_STR_LEN];
        for index in 0..count {
            self.invoke(Call::op("property_name"), |vt, dev| unsafe {
                (vt.property_name)(dev, index, buf.as_mut_ptr(), buf.len())
            })?;
            names.push(string_from_buffer(&buf));
        }
        Ok(names)
    }

    /// Whether the driver advertises `name`.
    pub fn has_property(&self, name: &str) -> bool {
        let Ok(c_name) = CString::new(name) else {
            return false;
        };
        self.query(|vt, dev| unsafe { (vt.has_property)(dev, c_name.as_ptr()) })
    }

    /// Current value of `name`, read from the driver.
    pub fn get_property(&self, name: &str) -> AdapterResult<String> {
        let c_name = self.property_name(name)?;
        let mut buf = vec![0 as c_char; MAX_STR_LEN];
        self.invoke(Call::Property { name, value: None }, |vt, dev| unsafe {
            (vt.get_property)(dev, c_name.as_ptr(), buf.as_mut_ptr(), buf.len())
        })?;
        Ok(string_from_buffer(&buf))
    }

    /// Write `value` to `name`.
    ///
    /// A rejected value is [`AdapterError::InvalidValue`] and leaves the device
    /// unchanged.
    pub fn set_property(&self, name: &str, value: &str) -> AdapterResult<()> {
        let c_name = self.property_name(name)?;
        let call = Call::Property {
            name,
            value: Some(value),
        };
        let c_value = CString::new(value).map_err(|_| {
            self.translate(call, status::INVALID_PROPERTY_VALUE, "value contains NUL".into())
        })?;

        let _span = self.loggers.device.enter();
        tracing::debug!(property = %name, value = %value, "set property");
        self.invoke(call, |vt, dev| unsafe {
            (vt.set_property)(dev, c_name.as_ptr(), c_value.as_ptr())
        })
    }

    /// Whether `name` rejects writes.
    pub fn is_property_read_only(&self, name: &str) -> AdapterResult<bool> {
        let c_name = self.property_name(name)?;
        let mut read_only = false;
        self.invoke(Call::Property { name, value: None }, |vt, dev| unsafe {
            (vt.property_read_only)(dev, c_name.as_ptr(), &mut read_only)
        })?;
        Ok(read_only)
    }

    /// Values the driver accepts for `name`; empty when unconstrained.
    pub fn allowed_property_values(&self, name: &str) -> AdapterResult<Vec<String>> {
        let c_name = self.property_name(name)?;
        let mut count = 0u32;
        self.invoke(Call::Property { name, value: None }, |vt, dev| unsafe {
            (vt.allowed_value_count)(dev, c_name.as_ptr(), &mut count)
        })?;

        let mut values = Vec::with_capacity(count as usize);
        let mut buf = vec![0 as c_char; MAX_STR_LEN];
        for index in 0..count {
            self.invoke(Call::Property { name, value: None }, |vt, dev| unsafe {
                (vt.allowed_value)(dev, c_name.as_ptr(), index, buf.as_mut_ptr(), buf.len())
            })?;
            values.push(string_from_buffer(&buf));
        }
        Ok(values)
    }

    fn property_name(&self, name: &str) -> AdapterResult<CString> {
        CString::new(name).map_err(|_| AdapterError::PropertyNotFound {
            label: self.label.clone(),
            property: name.to_string(),
        })
    }

    // =========================================================================
    // Call Forwarding
    // =========================================================================

    /// Forward a status-returning call under the instance lock.
    ///
    /// A nonzero status is translated while the lock is still held, so the
    /// driver's error text belongs to this call.
    pub(crate) fn invoke(
        &self,
        call: Call<'_>,
        f: impl FnOnce(&DeviceVTable, *mut RawDevice) -> i32,
    ) -> AdapterResult<()> {
        let _guard = self.lock.lock();
        let dev = self.guard.as_ptr();
        let code = f(self.guard.vtable(), dev);
        if code == status::OK {
            return Ok(());
        }
        let message = self.error_text(dev, code);
        let err = self.translate(call, code, message);
        let _span = self.loggers.device.enter();
        tracing::debug!(code, error = %err, "device call failed");
        Err(err)
    }

    /// Forward an infallible query under the instance lock.
    pub(crate) fn query<R>(&self, f: impl FnOnce(&DeviceVTable, *mut RawDevice) -> R) -> R {
        let _guard = self.lock.lock();
        f(self.guard.vtable(), self.guard.as_ptr())
    }

    /// Caller must hold `self.lock`.
    fn error_text(&self, dev: *mut RawDevice, code: i32) -> String {
        let mut buf = vec![0 as c_char; MAX_STR_LEN];
        // SAFETY: live handle, buffer of MAX_STR_LEN bytes.
        let found = unsafe { (self.guard.vtable().error_text)(dev, code, buf.as_mut_ptr(), buf.len()) };
        if found {
            string_from_buffer(&buf)
        } else {
            status::default_text(code)
        }
    }

    fn translate(&self, call: Call<'_>, code: i32, message: String) -> AdapterError {
        match (call, code) {
            (Call::Property { name, .. }, status::UNKNOWN_PROPERTY) => {
                AdapterError::PropertyNotFound {
                    label: self.label.clone(),
                    property: name.to_string(),
                }
            }
            (Call::Property { name, value: Some(value) }, status::INVALID_PROPERTY_VALUE) => {
                AdapterError::InvalidValue {
                    label: self.label.clone(),
                    property: name.to_string(),
                    value: value.to_string(),
                    message,
                }
            }
            (Call::Operation { name, value: Some(value) }, status::INVALID_PROPERTY_VALUE) => {
                AdapterError::InvalidValue {
                    label: self.label.clone(),
                    property: name.to_string(),
                    value: value.to_string(),
                    message,
                }
            }
            _ => AdapterError::DeviceCommunication {
                label: self.label.clone(),
                code,
                message,
            },
        }
    }
}

impl Drop for DeviceInstance {
    fn drop(&mut self) {
        let _span = self.loggers.core.enter();
        tracing::debug!(
            module = %self.guard.module().name(),
            device = %self.name,
            label = %self.label,
            "device released"
        );
    }
}

impl fmt::Debug for DeviceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceInstance")
            .field("label", &self.label)
            .field("name", &self.name)
            .field("category", &self.category)
            .field("module", &self.guard.module().name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::StaticModuleLoader;
    use crate::registry::ModuleRegistry;
    use tracing_test::traced_test;

    #[test]
    fn labels_are_validated() {
        assert!(validate_label("Wheel").is_ok());
        assert!(validate_label("Emission Filter 2").is_ok());

        for bad in ["", " Wheel", "Wheel\t", "Wh\neel"] {
            assert!(
                matches!(validate_label(bad), Err(AdapterError::InvalidLabel { .. })),
                "{:?} should be rejected",
                bad
            );
        }
        assert!(validate_label(&"x".repeat(MAX_STR_LEN)).is_err());
    }

    #[test]
    #[traced_test]
    fn lifecycle_events_are_recorded_in_core_span() {
        let registry = ModuleRegistry::new(
            StaticModuleLoader::new().with_adapter::<daq_adapter_demo::DemoAdapter>("demo"),
        );
        let device = registry
            .get_or_load("demo")
            .unwrap()
            .create_device(
                ControllerRef::detached(),
                "DWheel",
                "Emission",
                DeviceLoggers::for_label("Emission"),
            )
            .unwrap();
        assert!(logs_contain("device created"));
        assert!(!logs_contain("device released"));

        drop(device);
        assert!(logs_contain("device released"));
        assert!(logs_contain("core{device=Emission}"));
    }
}
