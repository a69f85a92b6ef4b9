//! Provider registry
//!
//! Holds the enabled identity providers keyed by name. Built once from
//! configuration and shared through the application state.

use std::collections::HashMap;
use std::sync::Arc;

use super::{IdentityProvider, OAuthProvider, ProviderError};
use crate::config::AppConfig;

/// Error type for registry operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    #[error("Provider '{name}' not found")]
    ProviderNotFound { name: String },
}

/// Enabled identity providers
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn IdentityProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an [`OAuthProvider`] for every configured provider
    pub fn from_config(config: &AppConfig) -> Result<Self, ProviderError> {
        let mut registry = Self::new();

        for (name, credentials) in &config.providers {
            let redirect_url =
                config
                    .callback_url(name)
                    .map_err(|e| ProviderError::Configuration {
                        provider: name.clone(),
                        details: format!("cannot build callback url: {e}"),
                    })?;

            let provider = OAuthProvider::from_credentials(name, credentials, redirect_url)?;
            tracing::info!(
                provider = %name,
                scopes = ?provider.scopes(),
                "Registered identity provider"
            );
            registry.register(Arc::new(provider));
        }

        if registry.providers.is_empty() {
            tracing::warn!("No identity providers configured; set ACCOUNTLINK_PROVIDERS");
        }

        Ok(registry)
    }

    /// Register a provider under its own name, replacing any previous one
    pub fn register(&mut self, provider: Arc<dyn IdentityProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    /// Get a provider by name
    pub fn get(&self, name: &str) -> Result<Arc<dyn IdentityProvider>, RegistryError> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::ProviderNotFound {
                name: name.to_string(),
            })
    }

    /// Provider names, sorted for stable ordering
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }
}
