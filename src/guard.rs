//! Ownership of raw device handles.

#![allow(unsafe_code)]

use crate::module::AdapterModule;
use daq_adapter_api::abi::{DeviceVTable, RawDevice};
use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::Arc;

/// Exclusive owner of one handle returned by a module's factory.
///
/// Dropping the guard passes the handle to the deleter of the module that
/// created it, then releases the guard's share of that module. The module
/// therefore outlives every handle it produced.
pub struct RawDeviceGuard {
    handle: NonNull<RawDevice>,
    module: Arc<AdapterModule>,
}

// SAFETY: the handle is only dereferenced through `&self`/`&mut self` methods
// and every device call is serialized by the owning `DeviceInstance` lock.
unsafe impl Send for RawDeviceGuard {}
unsafe impl Sync for RawDeviceGuard {}

impl RawDeviceGuard {
    /// Take ownership of `handle`.
    ///
    /// # Safety
    ///
    /// `handle` must come from `module`'s factory and must not be owned by
    /// anything else.
    pub(crate) unsafe fn new(handle: NonNull<RawDevice>, module: Arc<AdapterModule>) -> Self {
        Self { handle, module }
    }

    /// The raw pointer for passing to vtable functions.
    pub(crate) fn as_ptr(&self) -> *mut RawDevice {
        self.handle.as_ptr()
    }

    /// Generic device operations.
    pub(crate) fn vtable(&self) -> &DeviceVTable {
        // SAFETY: a live handle's header always points at a static vtable.
        unsafe { &*(*self.handle.as_ptr()).vtable }
    }

    /// Category table for `category`, if the device provides one.
    pub(crate) fn query_interface(&self, category: u32) -> Option<NonNull<c_void>> {
        // SAFETY: the handle is live for the lifetime of `self`.
        let table = unsafe { (self.vtable().query_interface)(self.as_ptr(), category) };
        NonNull::new(table.cast_mut())
    }

    /// Module that created the handle.
    pub(crate) fn module(&self) -> &Arc<AdapterModule> {
        &self.module
    }
}

impl Drop for RawDeviceGuard {
    fn drop(&mut self) {
        // SAFETY: the handle came from this module's factory and is released once.
        unsafe { self.module.delete_raw(self.handle) };
    }
}

impl std::fmt::Debug for RawDeviceGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawDeviceGuard")
            .field("handle", &self.handle)
            .field("module", &self.module.name())
            .finish()
    }
}

/// A category vtable narrowed from a device, valid while its device lives.
pub(crate) struct Interface<T: 'static> {
    table: NonNull<T>,
}

// SAFETY: category tables are immutable statics in the module image.
unsafe impl<T> Send for Interface<T> {}
unsafe impl<T> Sync for Interface<T> {}

impl<T> Interface<T> {
    /// # Safety
    ///
    /// `table` must point at a `T` that outlives this value.
    pub(crate) unsafe fn from_raw(table: NonNull<c_void>) -> Self {
        Self {
            table: table.cast(),
        }
    }
}

impl<T> std::ops::Deref for Interface<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: see `from_raw`; the owning device keeps the module loaded.
        unsafe { self.table.as_ref() }
    }
}
