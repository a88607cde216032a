//! C-ABI contract for rust-daq device adapter modules.
//!
//! Adapter modules are shared libraries that create device objects on request.
//! This crate defines the binary contract the host relies on ([`abi`]) and a
//! safe authoring layer for modules written in Rust ([`driver`], [`export`]).
//!
//! # Architecture
//!
//! ```text
//! ModuleRegistry (daq_adapters)
//! └── AdapterModule ── ModuleEntryPoints ← This crate
//!     └── DeviceInstance ── RawDevice → DeviceVTable → category vtable
//! ```
//!
//! # Creating an Adapter
//!
//! ```rust,ignore
//! use daq_adapter_api::prelude::*;
//!
//! struct MyAdapter;
//!
//! impl AdapterDefinition for MyAdapter {
//!     const DEVICES: &'static [DeviceDescriptor] = &[DeviceDescriptor {
//!         name: "Wheel",
//!         category: DeviceCategory::State,
//!         description: "Six-position filter wheel",
//!     }];
//!
//!     fn create_device(name: &str) -> Option<Box<dyn DriverDevice>> { ... }
//! }
//!
//! export_device_adapter!(MyAdapter);
//! ```

#![allow(unsafe_code)]

pub mod abi;
pub mod driver;
pub mod export;

pub use abi::{DeviceCategory, ModuleEntryPoints, RawDevice, ABI_VERSION};
pub use driver::{DriverDevice, DriverError, DriverResult, PropertyTable};
pub use export::{entry_points, AdapterDefinition, DeviceDescriptor};

/// Prelude for adapter authors
pub mod prelude {
    pub use crate::abi::{status, DeviceCategory};
    pub use crate::driver::{
        AutoFocusDriver, CameraDriver, DriverDevice, DriverError, DriverResult, GalvoDriver,
        HubDriver, ImageProcessorDriver, MagnifierDriver, PropertyTable, SerialDriver,
        ShutterDriver, SignalIoDriver, SlmDriver, StageDriver, StateDriver, XyStageDriver,
    };
    pub use crate::export::{entry_points, AdapterDefinition, DeviceDescriptor};
    pub use crate::export_device_adapter;
}
