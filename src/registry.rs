//! Name-keyed cache of loaded adapter modules.
//!
//! [`ModuleRegistry::get_or_load`] loads a module the first time its name is
//! requested and hands out the same `Arc` on every later call. Load-or-fetch is
//! serialized by one registry-wide lock, so concurrent first requests still
//! load the module exactly once.
//!
//! Eviction ([`ModuleRegistry::unload`]) only drops the registry's reference.
//! Devices created from the module keep it alive until they are dropped.

use crate::config::{AdapterConfig, LoadFailurePolicy};
use crate::error::{AdapterError, AdapterResult};
use crate::loader::{ModuleLoader, NativeModuleLoader};
use crate::module::AdapterModule;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

enum CacheEntry {
    Loaded(Arc<AdapterModule>),
    /// Only stored under [`LoadFailurePolicy::Poison`].
    Failed(AdapterError),
}

/// Cache of loaded adapter modules.
pub struct ModuleRegistry {
    loader: Box<dyn ModuleLoader>,
    policy: LoadFailurePolicy,
    modules: Mutex<HashMap<String, CacheEntry>>,
}

impl ModuleRegistry {
    /// Registry over `loader` with the default failure policy.
    pub fn new(loader: impl ModuleLoader + 'static) -> Self {
        Self::with_policy(loader, LoadFailurePolicy::default())
    }

    /// Registry over `loader` with an explicit failure policy.
    pub fn with_policy(loader: impl ModuleLoader + 'static, policy: LoadFailurePolicy) -> Self {
        Self {
            loader: Box::new(loader),
            policy,
            modules: Mutex::new(HashMap::new()),
        }
    }

    /// Registry loading native modules as described by `config`.
    pub fn from_config(config: &AdapterConfig) -> Self {
        Self::with_policy(
            NativeModuleLoader::from_config(config),
            config.load_failure_policy,
        )
    }

    /// Return the module called `name`, loading it on first use.
    ///
    /// Every successful call for the same name returns the same `Arc` until the
    /// module is evicted. A failed load is reported as
    /// [`AdapterError::ModuleLoad`]; whether it is remembered depends on the
    /// registry's [`LoadFailurePolicy`].
    pub fn get_or_load(&self, name: &str) -> AdapterResult<Arc<AdapterModule>> {
        let mut modules = self.modules.lock();

        match modules.get(name) {
            Some(CacheEntry::Loaded(module)) => {
                tracing::trace!(module = %name, "adapter module cache hit");
                return Ok(Arc::clone(module));
            }
            Some(CacheEntry::Failed(err)) => {
                tracing::debug!(module = %name, "adapter module previously failed to load");
                return Err(err.clone());
            }
            None => {}
        }

        let loaded = self
            .loader
            .bind(name)
            .and_then(|bound| AdapterModule::load(name, bound));

        match loaded {
            Ok(module) => {
                let module = Arc::new(module);
                modules.insert(name.to_string(), CacheEntry::Loaded(Arc::clone(&module)));
                Ok(module)
            }
            Err(err) => {
                tracing::warn!(module = %name, error = %err, "failed to load adapter module");
                if self.policy == LoadFailurePolicy::Poison {
                    modules.insert(name.to_string(), CacheEntry::Failed(err.clone()));
                }
                Err(err)
            }
        }
    }

    /// Names of the loaded modules, sorted.
    pub fn loaded_modules(&self) -> Vec<String> {
        let modules = self.modules.lock();
        let mut names: Vec<String> = modules
            .iter()
            .filter(|(_, entry)| matches!(entry, CacheEntry::Loaded(_)))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Whether `name` is loaded and cached.
    pub fn is_loaded(&self, name: &str) -> bool {
        matches!(self.modules.lock().get(name), Some(CacheEntry::Loaded(_)))
    }

    /// Names of modules available from the loader, sorted.
    pub fn available_modules(&self) -> Vec<String> {
        self.loader.discover()
    }

    /// Evict `name`. Returns false if it was not loaded.
    ///
    /// The library is closed once the last device created from it is dropped.
    pub fn unload(&self, name: &str) -> bool {
        let mut modules = self.modules.lock();
        match modules.remove(name) {
            Some(CacheEntry::Loaded(module)) => {
                tracing::info!(
                    module = %name,
                    outstanding = Arc::strong_count(&module) - 1,
                    "evicted adapter module"
                );
                true
            }
            Some(failed) => {
                modules.insert(name.to_string(), failed);
                false
            }
            None => false,
        }
    }

    /// Evict every loaded module.
    pub fn unload_all(&self) {
        let mut modules = self.modules.lock();
        let before = modules.len();
        modules.retain(|_, entry| matches!(entry, CacheEntry::Failed(_)));
        tracing::info!(count = before - modules.len(), "evicted all adapter modules");
    }

    /// Forget remembered load failures.
    pub fn clear_failures(&self) {
        self.modules
            .lock()
            .retain(|_, entry| matches!(entry, CacheEntry::Loaded(_)));
    }

    /// Failure policy in effect.
    pub fn policy(&self) -> LoadFailurePolicy {
        self.policy
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("policy", &self.policy)
            .field("loaded", &self.loaded_modules())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::StaticModuleLoader;
    use tracing_test::traced_test;

    #[test]
    fn unknown_module_is_not_cached_by_default() {
        let registry = ModuleRegistry::new(StaticModuleLoader::new());
        assert!(matches!(
            registry.get_or_load("missing"),
            Err(AdapterError::ModuleLoad { .. })
        ));
        assert!(registry.loaded_modules().is_empty());
        assert!(!registry.is_loaded("missing"));
        assert!(!registry.unload("missing"));
    }

    #[test]
    #[traced_test]
    fn eviction_is_logged_with_outstanding_owners() {
        let registry = ModuleRegistry::new(
            StaticModuleLoader::new().with_adapter::<daq_adapter_demo::DemoAdapter>("demo"),
        );
        let module = registry.get_or_load("demo").unwrap();
        assert!(registry.is_loaded("demo"));

        assert!(registry.unload("demo"));
        assert!(logs_contain("evicted adapter module"));
        assert!(logs_contain("outstanding=1"));
        drop(module);
    }

    #[test]
    fn config_selects_policy() {
        let config = AdapterConfig {
            load_failure_policy: LoadFailurePolicy::Poison,
            ..AdapterConfig::default()
        };
        let registry = ModuleRegistry::from_config(&config);
        assert_eq!(registry.policy(), LoadFailurePolicy::Poison);
    }
}
