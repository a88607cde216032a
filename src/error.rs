//! Error types for the adapter host.
//!
//! Every failure surfaces to the immediate caller as an [`AdapterError`]. This
//! layer never retries and never swallows a driver status: the controller above
//! decides what to do with each condition.
//!
//! ## Error Hierarchy
//!
//! - **`ModuleLoad`**: the module file is missing, is not a loadable library,
//!   lacks a required entry point, or was built against a different ABI.
//! - **`DeviceNotFound`**: the module does not advertise the requested name.
//! - **`DeviceCreation`**: the factory returned no handle, or the handle could
//!   not be turned into a typed device (wrong category, missing interface).
//! - **`InvalidLabel`**: the controller-visible label failed validation.
//! - **`PropertyNotFound`** / **`InvalidValue`**: property protocol failures.
//! - **`DeviceCommunication`**: any other nonzero driver status, with the
//!   driver's own description.

use daq_adapter_api::abi::status;
use thiserror::Error;

/// Convenience alias for results using the host error type.
pub type AdapterResult<T> = std::result::Result<T, AdapterError>;

/// Primary error type for module loading and device access.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdapterError {
    /// Module library could not be loaded or is incompatible.
    ///
    /// **Error Type**: Permanent for this build of the module. Retrying only
    /// helps if the file on disk changes (see `LoadFailurePolicy`).
    #[error("Failed to load adapter module '{module}': {reason}")]
    ModuleLoad {
        /// Module name as requested
        module: String,
        /// What went wrong
        reason: String,
    },

    /// Requested device name is not advertised by the module.
    #[error("Device '{device}' is not advertised by adapter module '{module}'")]
    DeviceNotFound {
        /// Module name
        module: String,
        /// Requested device name
        device: String,
    },

    /// The module failed to produce a usable device.
    #[error("Failed to create device '{device}' from adapter module '{module}': {reason}")]
    DeviceCreation {
        /// Module name
        module: String,
        /// Requested device name
        device: String,
        /// What went wrong
        reason: String,
    },

    /// Controller-supplied label rejected during construction.
    #[error("Invalid device label '{label}': {reason}")]
    InvalidLabel {
        /// Offending label
        label: String,
        /// Validation failure
        reason: String,
    },

    /// Property not advertised by the device.
    #[error("Device '{label}' has no property '{property}'")]
    PropertyNotFound {
        /// Device label
        label: String,
        /// Requested property
        property: String,
    },

    /// Driver rejected a value; device state is unchanged.
    #[error("Device '{label}' rejected value '{value}' for '{property}': {message}")]
    InvalidValue {
        /// Device label
        label: String,
        /// Property or operation the value was for
        property: String,
        /// Rejected value
        value: String,
        /// Driver description
        message: String,
    },

    /// Driver reported a failure.
    ///
    /// **Error Type**: Hardware dependent. This layer does not retry.
    #[error("Device '{label}' error {code}: {message}")]
    DeviceCommunication {
        /// Device label
        label: String,
        /// Driver status code
        code: i32,
        /// Driver description for `code`
        message: String,
    },
}

impl AdapterError {
    /// Driver status code, if the error came from a driver call.
    pub fn status_code(&self) -> Option<i32> {
        match self {
            Self::DeviceCommunication { code, .. } => Some(*code),
            Self::InvalidValue { .. } => Some(status::INVALID_PROPERTY_VALUE),
            Self::PropertyNotFound { .. } => Some(status::UNKNOWN_PROPERTY),
            _ => None,
        }
    }

    pub(crate) fn module_load(module: &str, reason: impl Into<String>) -> Self {
        Self::ModuleLoad {
            module: module.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn creation(module: &str, device: &str, reason: impl Into<String>) -> Self {
        Self::DeviceCreation {
            module: module.to_string(),
            device: device.to_string(),
            reason: reason.into(),
        }
    }
}
