//! Provider registry.
//!
//! An explicit name-to-provider map constructed once at process start and
//! passed by reference to the services that need it. There is no global
//! mutable registry.

use std::collections::HashMap;
use std::sync::Arc;

use fable_shared::config::StorageSettings;

use super::error::StorageError;
use super::provider::{ObjectStore, OpendalStore};

/// Registry of named object store providers.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn ObjectStore>>,
    default_name: String,
}

impl ProviderRegistry {
    /// Create an empty registry with the given default provider name.
    #[must_use]
    pub fn new(default_name: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_name: default_name.into(),
        }
    }

    /// Build a registry from storage settings.
    ///
    /// # Errors
    ///
    /// Returns an error if a provider cannot be initialized, or if the
    /// configured default provider is not among the registered ones.
    pub fn from_settings(settings: &StorageSettings) -> Result<Self, StorageError> {
        let mut registry = Self::new(&settings.default_provider);
        for provider in &settings.providers {
            registry.register(Arc::new(OpendalStore::from_settings(provider)?));
        }
        if !registry.providers.contains_key(&settings.default_provider) {
            return Err(StorageError::configuration(format!(
                "default provider '{}' is not registered",
                settings.default_provider
            )));
        }
        Ok(registry)
    }

    /// Register a provider under its own name. Replaces any previous provider
    /// with the same name.
    pub fn register(&mut self, store: Arc<dyn ObjectStore>) {
        self.providers.insert(store.name().to_string(), store);
    }

    /// Look up a provider by name.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UnknownProvider`] if no provider is registered
    /// under `name`.
    pub fn get(&self, name: &str) -> Result<Arc<dyn ObjectStore>, StorageError> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::unknown_provider(name))
    }

    /// The default provider.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UnknownProvider`] if the default provider was
    /// never registered.
    pub fn default_provider(&self) -> Result<Arc<dyn ObjectStore>, StorageError> {
        self.get(&self.default_name)
    }

    /// Resolve an optional provider name, falling back to the default.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UnknownProvider`] for an unregistered name.
    pub fn resolve(&self, name: Option<&str>) -> Result<Arc<dyn ObjectStore>, StorageError> {
        match name {
            Some(name) => self.get(name),
            None => self.default_provider(),
        }
    }

    /// Names of all registered providers.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }
}
