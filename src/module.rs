//! One loaded adapter module.
//!
//! An [`AdapterModule`] is created by the registry from a [`BoundModule`]. Loading
//! checks the ABI revision, runs the module initializer exactly once and caches
//! the advertised device list. After that the module only hands out devices.
//!
//! Modules are shared through `Arc`. The registry holds one reference and every
//! device created from the module holds another, so the library stays mapped
//! until the last device is dropped, even if the registry evicted it earlier.

#![allow(unsafe_code)]

use crate::controller::ControllerRef;
use crate::devices::{self, TypedDevice};
use crate::error::{AdapterError, AdapterResult};
use crate::guard::RawDeviceGuard;
use crate::instance::{validate_label, DeviceInstance};
use crate::loader::BoundModule;
use crate::logging::DeviceLoggers;
use daq_adapter_api::abi::{
    string_from_buffer, DeviceCategory, ModuleEntryPoints, RawDevice, ABI_VERSION, MAX_STR_LEN,
};
use libloading::Library;
use std::ffi::{c_char, CString};
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::Arc;

/// Static metadata of one device a module can create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisedDevice {
    /// Name used to request the device
    pub name: String,
    /// Advertised category
    pub category: DeviceCategory,
    /// Human-readable description
    pub description: String,
}

/// A loaded adapter module.
pub struct AdapterModule {
    name: String,
    path: Option<PathBuf>,
    entry_points: ModuleEntryPoints,
    devices: Vec<AdvertisedDevice>,
    // Declared last: entry points above point into this library.
    _library: Option<Library>,
}

impl AdapterModule {
    /// Validate, initialize and enumerate a bound module.
    pub fn load(name: &str, bound: BoundModule) -> AdapterResult<Self> {
        let BoundModule {
            entry_points,
            path,
            library,
        } = bound;

        // SAFETY: entry points come from a bound module and stay valid while
        // `library` (if any) is open; it is kept alongside them below.
        let abi_version = unsafe { (entry_points.abi_version)() };
        if abi_version != ABI_VERSION {
            return Err(AdapterError::module_load(
                name,
                format!(
                    "ABI version mismatch: host expects {}, module reports {}",
                    ABI_VERSION, abi_version
                ),
            ));
        }

        tracing::debug!(module = %name, "initializing adapter module");
        // SAFETY: as above; the initializer runs once per load.
        unsafe { (entry_points.initialize)() };

        let devices = enumerate(name, &entry_points);
        tracing::info!(
            module = %name,
            path = ?path,
            devices = devices.len(),
            "adapter module loaded"
        );

        Ok(Self {
            name: name.to_string(),
            path,
            entry_points,
            devices,
            _library: library,
        })
    }

    /// Module name as requested from the registry.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// File the module was loaded from; `None` for linked modules.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Advertised devices in module order.
    pub fn advertised_devices(&self) -> &[AdvertisedDevice] {
        &self.devices
    }

    /// Advertised device names in module order.
    pub fn list_advertised_devices(&self) -> Vec<String> {
        self.devices.iter().map(|d| d.name.clone()).collect()
    }

    /// Description of an advertised device.
    pub fn device_description(&self, device_name: &str) -> AdapterResult<String> {
        self.advertised(device_name).map(|d| d.description.clone())
    }

    /// Category of an advertised device.
    pub fn advertised_device_type(&self, device_name: &str) -> AdapterResult<DeviceCategory> {
        self.advertised(device_name).map(|d| d.category)
    }

    fn advertised(&self, device_name: &str) -> AdapterResult<&AdvertisedDevice> {
        self.devices
            .iter()
            .find(|d| d.name == device_name)
            .ok_or_else(|| AdapterError::DeviceNotFound {
                module: self.name.clone(),
                device: device_name.to_string(),
            })
    }

    /// Create the device `device_name` and wrap it in its typed device.
    ///
    /// The raw handle is owned by a [`RawDeviceGuard`] from the moment the
    /// factory returns. Any failure after that point deletes the handle exactly
    /// once before the error is returned.
    pub fn create_device(
        self: &Arc<Self>,
        controller: ControllerRef,
        device_name: &str,
        label: &str,
        loggers: DeviceLoggers,
    ) -> AdapterResult<TypedDevice> {
        let advertised = self.advertised(device_name)?;
        let category = advertised.category;
        let description = advertised.description.clone();

        let c_name = CString::new(device_name)
            .map_err(|_| AdapterError::creation(&self.name, device_name, "name contains NUL"))?;
        // SAFETY: the factory is a valid entry point of this module.
        let raw = unsafe { (self.entry_points.create_device)(c_name.as_ptr()) };
        let handle = NonNull::new(raw).ok_or_else(|| {
            AdapterError::creation(&self.name, device_name, "module factory returned no device")
        })?;
        // SAFETY: the handle was just produced by this module's factory.
        let guard = unsafe { RawDeviceGuard::new(handle, Arc::clone(self)) };
        loggers.core.in_scope(|| {
            tracing::debug!(module = %self.name, device = %device_name, label = %label, "device created");
        });

        validate_label(label)?;
        let instance = DeviceInstance::new(
            guard,
            controller,
            device_name,
            label,
            category,
            description,
            loggers,
        )?;
        devices::construct(instance)
    }

    /// Pass `handle` to this module's deleter.
    ///
    /// # Safety
    ///
    /// `handle` must come from this module's factory and must not be used again.
    pub(crate) unsafe fn delete_raw(&self, handle: NonNull<RawDevice>) {
        tracing::debug!(module = %self.name, "deleting device");
        // SAFETY: forwarded from the caller.
        unsafe { (self.entry_points.delete_device)(handle.as_ptr()) };
    }
}

fn enumerate(module: &str, entry_points: &ModuleEntryPoints) -> Vec<AdvertisedDevice> {
    // SAFETY: entry points of a validated module.
    let count = unsafe { (entry_points.device_count)() };
    let mut devices = Vec::with_capacity(count as usize);
    let mut buf = vec![0 as c_char; MAX_STR_LEN];

    for index in 0..count {
        // SAFETY: `buf` holds MAX_STR_LEN bytes.
        if !unsafe { (entry_points.device_name)(index, buf.as_mut_ptr(), buf.len()) } {
            tracing::warn!(module = %module, index, "module did not report a name for device");
            continue;
        }
        let name = string_from_buffer(&buf);
        let Ok(c_name) = CString::new(name.as_str()) else {
            continue;
        };

        // SAFETY: `c_name` is NUL-terminated.
        let raw_category = unsafe { (entry_points.device_type)(c_name.as_ptr()) };
        let Some(category) = DeviceCategory::from_raw(raw_category) else {
            tracing::warn!(
                module = %module,
                device = %name,
                tag = raw_category,
                "skipping device with unknown category"
            );
            continue;
        };

        buf.fill(0);
        // SAFETY: as above.
        let description = if unsafe {
            (entry_points.device_description)(c_name.as_ptr(), buf.as_mut_ptr(), buf.len())
        } {
            string_from_buffer(&buf)
        } else {
            String::new()
        };

        devices.push(AdvertisedDevice {
            name,
            category,
            description,
        });
    }

    devices
}

impl std::fmt::Debug for AdapterModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterModule")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("devices", &self.devices.len())
            .finish()
    }
}

impl Drop for AdapterModule {
    fn drop(&mut self) {
        tracing::info!(module = %self.name, "adapter module released");
    }
}
