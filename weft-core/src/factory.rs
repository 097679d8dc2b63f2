//! Provider factory: an open, name-keyed registry of adapter constructors.
//!
//! New providers are added with [`ProviderFactory::register`] at startup; no
//! existing adapter changes. Credentials are resolved per call: an explicit
//! override wins, then the configured [`CredentialSource`].

use crate::config::{CredentialSource, EnvCredentials, ProviderOptions};
use crate::error::WeftError;
use crate::provider::BoxedProvider;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;

/// Provider built when no name is given
pub const DEFAULT_PROVIDER: &str = "google";

/// Everything a constructor needs to build an adapter
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Registered provider name
    pub name: String,
    /// Resolved credential; `None` only for ambient-identity providers
    pub api_key: Option<String>,
    /// Overrides merged with the factory defaults
    pub options: ProviderOptions,
}

impl ProviderConfig {
    /// The credential, or a configuration error naming the provider
    pub fn require_api_key(&self) -> Result<&str, WeftError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                WeftError::configuration(format!("API key not found for provider '{}'", self.name))
            })
    }
}

/// Adapter constructor stored in the registry
pub type ProviderConstructor =
    Arc<dyn Fn(ProviderConfig) -> Result<BoxedProvider, WeftError> + Send + Sync>;

/// A registry entry
#[derive(Clone)]
pub struct Registration {
    constructor: ProviderConstructor,
    requires_credential: bool,
}

impl Registration {
    /// Entry for a provider that needs an explicit credential
    pub fn new<F>(constructor: F) -> Self
    where
        F: Fn(ProviderConfig) -> Result<BoxedProvider, WeftError> + Send + Sync + 'static,
    {
        Self {
            constructor: Arc::new(constructor),
            requires_credential: true,
        }
    }

    /// Entry for a provider authenticating through ambient identity
    pub fn ambient<F>(constructor: F) -> Self
    where
        F: Fn(ProviderConfig) -> Result<BoxedProvider, WeftError> + Send + Sync + 'static,
    {
        Self {
            constructor: Arc::new(constructor),
            requires_credential: false,
        }
    }

    pub fn requires_credential(&self) -> bool {
        self.requires_credential
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("requires_credential", &self.requires_credential)
            .finish()
    }
}

/// Registry of adapter constructors
pub struct ProviderFactory {
    registry: DashMap<String, Registration>,
    credentials: Arc<dyn CredentialSource>,
    defaults: ProviderOptions,
    default_provider: String,
}

impl ProviderFactory {
    /// Create an empty factory reading credentials from the environment
    pub fn new() -> Self {
        Self {
            registry: DashMap::new(),
            credentials: Arc::new(EnvCredentials),
            defaults: ProviderOptions::default(),
            default_provider: DEFAULT_PROVIDER.to_string(),
        }
    }

    /// Use a different credential source
    pub fn with_credentials(mut self, credentials: impl CredentialSource + 'static) -> Self {
        self.credentials = Arc::new(credentials);
        self
    }

    /// Defaults merged under every `create` override
    pub fn with_defaults(mut self, defaults: ProviderOptions) -> Self {
        self.defaults = defaults;
        self
    }

    /// Change the provider built by `create_default`
    pub fn with_default_provider(mut self, name: impl Into<String>) -> Self {
        self.default_provider = name.into();
        self
    }

    /// Register (or replace) a provider constructor
    pub fn register(&self, name: impl Into<String>, registration: Registration) {
        let name = name.into();
        tracing::debug!(provider = %name, "registering provider");
        self.registry.insert(name, registration);
    }

    /// Whether a provider name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.registry.contains_key(name)
    }

    /// Registered provider names, sorted
    pub fn available_providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Build an adapter for `name`
    pub fn create(&self, name: &str, overrides: ProviderOptions) -> Result<BoxedProvider, WeftError> {
        let registration = self
            .registry
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| WeftError::UnknownProvider {
                name: name.to_string(),
                available: self.available_providers(),
            })?;

        let options = overrides.merged_with(&self.defaults);
        let api_key = options
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.credentials.credential(name));

        if registration.requires_credential && api_key.is_none() {
            return Err(WeftError::configuration(format!(
                "API key not found for provider '{}'",
                name
            )));
        }

        (registration.constructor)(ProviderConfig {
            name: name.to_string(),
            api_key,
            options,
        })
    }

    /// Build the designated default provider
    pub fn create_default(&self) -> Result<BoxedProvider, WeftError> {
        self.create(&self.default_provider, ProviderOptions::default())
    }
}

impl Default for ProviderFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProviderFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderFactory")
            .field("providers", &self.available_providers())
            .field("default_provider", &self.default_provider)
            .finish()
    }
}
