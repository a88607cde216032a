//! Where adapter modules come from.
//!
//! A [`ModuleLoader`] turns a module name into resolved entry points. Two
//! sources exist:
//!
//! - [`NativeModuleLoader`] opens shared libraries from the configured search
//!   paths with `libloading` and resolves the exported `daq_adapter_*` symbols.
//! - [`StaticModuleLoader`] serves modules linked into the process, registered
//!   as [`ModuleEntryPoints`] tables.
//!
//! Loaders only bind. ABI checks, initialization and enumeration happen in
//! [`crate::module::AdapterModule::load`], identically for both sources.

#![allow(unsafe_code)]

use crate::config::AdapterConfig;
use crate::error::{AdapterError, AdapterResult};
use daq_adapter_api::abi::{symbols, ModuleEntryPoints};
use daq_adapter_api::export::{entry_points, AdapterDefinition};
use libloading::Library;
use std::collections::BTreeMap;
use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::path::{Path, PathBuf};

/// Entry points of one module plus whatever keeps them valid.
pub struct BoundModule {
    pub(crate) entry_points: ModuleEntryPoints,
    pub(crate) path: Option<PathBuf>,
    pub(crate) library: Option<Library>,
}

impl BoundModule {
    /// Module linked into the process.
    pub fn linked(entry_points: ModuleEntryPoints) -> Self {
        Self {
            entry_points,
            path: None,
            library: None,
        }
    }

    /// File the module was loaded from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl std::fmt::Debug for BoundModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundModule")
            .field("path", &self.path)
            .field("native", &self.library.is_some())
            .finish()
    }
}

/// Source of adapter modules.
pub trait ModuleLoader: Send + Sync {
    /// Bind the module called `name`.
    fn bind(&self, name: &str) -> AdapterResult<BoundModule>;

    /// Names of the modules this source can bind, sorted.
    fn discover(&self) -> Vec<String>;
}

// =============================================================================
// Native
// =============================================================================

/// Loads adapter modules from shared libraries on disk.
///
/// A module called `demo` with the default prefix is looked up as
/// `libdaq_adapter_demo.so`, `libdaq_adapter_demo.dylib` or
/// `daq_adapter_demo.dll` depending on the platform.
#[derive(Debug, Clone)]
pub struct NativeModuleLoader {
    search_paths: Vec<PathBuf>,
    file_prefix: String,
}

impl NativeModuleLoader {
    /// Loader with explicit search paths and the default prefix.
    pub fn new<I, P>(search_paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            search_paths: search_paths.into_iter().map(Into::into).collect(),
            file_prefix: AdapterConfig::default().file_prefix,
        }
    }

    /// Loader configured from `config`.
    pub fn from_config(config: &AdapterConfig) -> Self {
        Self {
            search_paths: config.search_paths.clone(),
            file_prefix: config.file_prefix.clone(),
        }
    }

    /// Append a search path.
    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        self.search_paths.push(path.into());
    }

    /// Configured search paths, in search order.
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Platform file name for module `name`.
    pub fn file_name(&self, name: &str) -> String {
        format!("{}{}{}{}", DLL_PREFIX, self.file_prefix, name, DLL_SUFFIX)
    }

    /// First existing file for module `name`.
    pub fn locate(&self, name: &str) -> Option<PathBuf> {
        let file_name = self.file_name(name);
        self.search_paths
            .iter()
            .map(|dir| dir.join(&file_name))
            .find(|path| path.is_file())
    }

    /// Bind a module from an explicit file.
    ///
    /// Opening a library runs its initializers. Only trusted adapter modules
    /// may be placed on the search paths.
    pub fn bind_path(&self, name: &str, path: &Path) -> AdapterResult<BoundModule> {
        // SAFETY: search paths are trusted locations for adapter modules.
        let library = unsafe { Library::new(path) }
            .map_err(|e| AdapterError::module_load(name, format!("{}: {}", path.display(), e)))?;

        let entry_points = ModuleEntryPoints {
            abi_version: resolve(&library, name, symbols::ABI_VERSION)?,
            initialize: resolve(&library, name, symbols::INITIALIZE)?,
            device_count: resolve(&library, name, symbols::DEVICE_COUNT)?,
            device_name: resolve(&library, name, symbols::DEVICE_NAME)?,
            device_type: resolve(&library, name, symbols::DEVICE_TYPE)?,
            device_description: resolve(&library, name, symbols::DEVICE_DESCRIPTION)?,
            create_device: resolve(&library, name, symbols::CREATE_DEVICE)?,
            delete_device: resolve(&library, name, symbols::DELETE_DEVICE)?,
        };

        Ok(BoundModule {
            entry_points,
            path: Some(path.to_path_buf()),
            library: Some(library),
        })
    }
}

/// Copy a function pointer out of `library`.
///
/// The pointer stays valid as long as `library` is open; `BoundModule` keeps
/// both together.
fn resolve<T: Copy>(library: &Library, module: &str, symbol: &[u8]) -> AdapterResult<T> {
    // SAFETY: `T` is the ABI signature declared for `symbol`.
    unsafe { library.get::<T>(symbol) }
        .map(|sym| *sym)
        .map_err(|_| {
            let printable = String::from_utf8_lossy(symbol.strip_suffix(b"\0").unwrap_or(symbol));
            AdapterError::module_load(module, format!("missing entry point '{}'", printable))
        })
}

impl ModuleLoader for NativeModuleLoader {
    fn bind(&self, name: &str) -> AdapterResult<BoundModule> {
        let path = self.locate(name).ok_or_else(|| {
            AdapterError::module_load(
                name,
                format!(
                    "'{}' not found in search paths [{}]",
                    self.file_name(name),
                    self.search_paths
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            )
        })?;
        self.bind_path(name, &path)
    }

    fn discover(&self) -> Vec<String> {
        let lead = format!("{}{}", DLL_PREFIX, self.file_prefix);
        let mut names: Vec<String> = self
            .search_paths
            .iter()
            .filter_map(|dir| std::fs::read_dir(dir).ok())
            .flat_map(|entries| entries.flatten())
            .filter_map(|entry| {
                let file_name = entry.file_name().into_string().ok()?;
                let name = file_name.strip_prefix(&lead)?.strip_suffix(DLL_SUFFIX)?;
                (!name.is_empty()).then(|| name.to_string())
            })
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

// =============================================================================
// Static
// =============================================================================

/// Serves modules compiled into the host process.
#[derive(Debug, Clone, Default)]
pub struct StaticModuleLoader {
    modules: BTreeMap<String, ModuleEntryPoints>,
}

impl StaticModuleLoader {
    /// Empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry-point table under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, entry_points: ModuleEntryPoints) {
        self.modules.insert(name.into(), entry_points);
    }

    /// Register an [`AdapterDefinition`] under `name`.
    pub fn with_adapter<A: AdapterDefinition>(mut self, name: impl Into<String>) -> Self {
        self.register(name, entry_points::<A>());
        self
    }
}

impl ModuleLoader for StaticModuleLoader {
    fn bind(&self, name: &str) -> AdapterResult<BoundModule> {
        self.modules
            .get(name)
            .map(|eps| BoundModule::linked(*eps))
            .ok_or_else(|| AdapterError::module_load(name, "no statically linked module with this name"))
    }

    fn discover(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }
}
