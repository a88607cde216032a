//! # DAQ Adapter Host
//!
//! Loads device adapter modules at runtime and exposes every device they
//! create (cameras, stages, shutters, filter wheels, ...) through one typed,
//! property-based interface.
//!
//! ## Crate Structure
//!
//! - **`registry`**: `ModuleRegistry`, the name-keyed cache of loaded modules.
//! - **`loader`**: where modules come from (`NativeModuleLoader` for shared
//!   libraries, `StaticModuleLoader` for modules linked into the process).
//! - **`module`**: `AdapterModule`, one loaded module: its advertised devices and
//!   the device factory.
//! - **`instance`**: `DeviceInstance`, the generic device with its property
//!   protocol and per-instance call lock.
//! - **`devices`**: one typed wrapper per category, gathered in `TypedDevice`.
//! - **`guard`**: `RawDeviceGuard`, exclusive ownership of a raw device handle.
//! - **`controller`**: `ControllerRef`, the weak link back to the controller.
//! - **`config`**: `AdapterConfig`, loaded with figment from TOML and the environment.
//! - **`logging`**: subscriber setup and `DeviceLoggers`.
//! - **`error`**: `AdapterError`, the error type for the whole crate.
//!
//! ## Example
//!
//! ```no_run
//! use daq_adapters::prelude::*;
//!
//! let registry = ModuleRegistry::from_config(&AdapterConfig::load_from("adapters.toml")?);
//! let module = registry.get_or_load("demo")?;
//! let device = module.create_device(
//!     ControllerRef::detached(),
//!     "DWheel",
//!     "Emission",
//!     DeviceLoggers::for_label("Emission"),
//! )?;
//! device.initialize()?;
//! if let Some(wheel) = device.as_state() {
//!     wheel.set_position(2)?;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod controller;
pub mod devices;
pub mod error;
pub mod guard;
pub mod instance;
pub mod loader;
pub mod logging;
pub mod module;
pub mod registry;

pub use daq_adapter_api::DeviceCategory;
pub use error::{AdapterError, AdapterResult};

/// Common imports for controllers.
pub mod prelude {
    pub use crate::config::{AdapterConfig, LoadFailurePolicy};
    pub use crate::controller::{Controller, ControllerRef};
    pub use crate::devices::{Device, TypedDevice};
    pub use crate::error::{AdapterError, AdapterResult};
    pub use crate::loader::{ModuleLoader, NativeModuleLoader, StaticModuleLoader};
    pub use crate::logging::DeviceLoggers;
    pub use crate::module::{AdapterModule, AdvertisedDevice};
    pub use crate::registry::ModuleRegistry;
    pub use daq_adapter_api::DeviceCategory;
}
