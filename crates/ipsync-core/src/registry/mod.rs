//! Plugin-based provider registry
//!
//! The registry allows zone providers and address resolvers to be registered
//! dynamically at runtime, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ipsync_core::registry::ProviderRegistry;
//!
//! let registry = ProviderRegistry::new();
//! ipsync_provider_cloudflare::register(&registry);
//! ipsync_resolver::register(&registry);
//!
//! let provider = registry.create_provider(&config.provider)?;
//! let resolver = registry.create_resolver("opendns")?;
//! ```

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::traits::{AddressResolver, AddressResolverFactory, ZoneProvider, ZoneProviderFactory};

/// Registry for plugin-based provider and resolver creation
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes. A poisoned lock is recovered, since the maps
/// are only ever replaced entry by entry.
#[derive(Default)]
pub struct ProviderRegistry {
    /// Registered zone provider factories
    providers: RwLock<HashMap<String, Box<dyn ZoneProviderFactory>>>,

    /// Registered address resolver factories
    resolvers: RwLock<HashMap<String, Box<dyn AddressResolverFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a zone provider factory
    ///
    /// # Parameters
    ///
    /// - `name`: Provider type name (e.g., "cloudflare")
    /// - `factory`: Factory object for creating provider instances
    pub fn register_provider(&self, name: impl Into<String>, factory: Box<dyn ZoneProviderFactory>) {
        let mut providers = self.providers.write().unwrap_or_else(PoisonError::into_inner);
        providers.insert(name.into(), factory);
    }

    /// Register an address resolver factory
    pub fn register_resolver(
        &self,
        name: impl Into<String>,
        factory: Box<dyn AddressResolverFactory>,
    ) {
        let mut resolvers = self.resolvers.write().unwrap_or_else(PoisonError::into_inner);
        resolvers.insert(name.into(), factory);
    }

    /// Create a zone provider from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn ZoneProvider>)`: Created provider instance
    /// - `Err(Error)`: If provider type is not registered or creation fails
    pub fn create_provider(&self, config: &ProviderConfig) -> Result<Box<dyn ZoneProvider>> {
        let provider_type = config.type_name();
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);

        let factory = providers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config)
    }

    /// Create an address resolver by name
    pub fn create_resolver(&self, name: &str) -> Result<Box<dyn AddressResolver>> {
        let resolvers = self.resolvers.read().unwrap_or_else(PoisonError::into_inner);

        let factory = resolvers
            .get(name)
            .ok_or_else(|| Error::config(format!("Unknown resolver: {}", name)))?;

        factory.create()
    }

    /// List all registered provider types
    pub fn list_providers(&self) -> Vec<String> {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        providers.keys().cloned().collect()
    }

    /// List all registered resolver names
    pub fn list_resolvers(&self) -> Vec<String> {
        let resolvers = self.resolvers.read().unwrap_or_else(PoisonError::into_inner);
        resolvers.keys().cloned().collect()
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        providers.contains_key(name)
    }

    /// Check if a resolver is registered
    pub fn has_resolver(&self, name: &str) -> bool {
        let resolvers = self.resolvers.read().unwrap_or_else(PoisonError::into_inner);
        resolvers.contains_key(name)
    }
}
