//! Explicit provider factory
//!
//! Providers are registered by name at startup; lookups of unregistered
//! names are errors, never silent defaults.

use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::{
    BraveProvider, DuckDuckGoProvider, ProviderConfig, ProviderError, SearchProvider,
    SerperProvider, TavilyProvider,
};

/// Builds a provider from its configuration
pub type ProviderConstructor =
    Box<dyn Fn(&ProviderConfig) -> Result<Arc<dyn SearchProvider>, ProviderError> + Send + Sync>;

#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("unknown provider '{0}'")]
    UnknownProvider(String),

    #[error("failed to construct provider '{name}': {source}")]
    Construction {
        name: String,
        #[source]
        source: ProviderError,
    },
}

/// Name-keyed provider constructors
#[derive(Default)]
pub struct ProviderFactory {
    constructors: BTreeMap<String, ProviderConstructor>,
}

impl ProviderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory with the four built-in backends registered
    pub fn with_builtin() -> Self {
        let mut factory = Self::new();
        factory.register(BraveProvider::ID, |config| {
            Ok(Arc::new(BraveProvider::new(config)?) as Arc<dyn SearchProvider>)
        });
        factory.register(SerperProvider::ID, |config| {
            Ok(Arc::new(SerperProvider::new(config)?) as Arc<dyn SearchProvider>)
        });
        factory.register(TavilyProvider::ID, |config| {
            Ok(Arc::new(TavilyProvider::new(config)?) as Arc<dyn SearchProvider>)
        });
        factory.register(DuckDuckGoProvider::ID, |config| {
            Ok(Arc::new(DuckDuckGoProvider::new(config)?) as Arc<dyn SearchProvider>)
        });
        factory
    }

    /// Register or replace a constructor
    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn(&ProviderConfig) -> Result<Arc<dyn SearchProvider>, ProviderError>
            + Send
            + Sync
            + 'static,
    {
        self.constructors.insert(name.to_string(), Box::new(constructor));
    }

    /// Register an already-built instance under its own id
    pub fn register_instance(&mut self, provider: Arc<dyn SearchProvider>) {
        let name = provider.id().to_string();
        self.register(&name, move |_| Ok(provider.clone()));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    pub fn create(
        &self,
        name: &str,
        config: &ProviderConfig,
    ) -> Result<Arc<dyn SearchProvider>, FactoryError> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| FactoryError::UnknownProvider(name.to_string()))?;
        constructor(config).map_err(|source| FactoryError::Construction {
            name: name.to_string(),
            source,
        })
    }
}
