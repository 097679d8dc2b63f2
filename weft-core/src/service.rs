//! Generation service: the façade callers use.
//!
//! Owns a name-keyed cache of constructed adapters, dispatches generation to
//! the adapter named by the request and fans health/model reports out across
//! every registered provider.

use crate::config::ProviderOptions;
use crate::error::WeftError;
use crate::factory::ProviderFactory;
use crate::layer::DynLayer;
use crate::provider::BoxedProvider;
use crate::types::*;
use dashmap::DashMap;
use futures::future::join_all;
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Cache of constructed adapters, keyed by provider name.
///
/// Cloning shares the underlying map. Construction failures are never
/// stored, so the next request for that name tries again.
#[derive(Clone, Default)]
pub struct AdapterCache {
    adapters: Arc<DashMap<String, BoxedProvider>>,
}

impl AdapterCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached adapter for a name
    pub fn get(&self, name: &str) -> Option<BoxedProvider> {
        self.adapters.get(name).map(|entry| entry.value().clone())
    }

    /// Insert unless another adapter won the race; returns the cached one
    pub fn get_or_insert(&self, name: &str, adapter: BoxedProvider) -> BoxedProvider {
        self.adapters
            .entry(name.to_string())
            .or_insert(adapter)
            .value()
            .clone()
    }

    /// Drop a cached adapter
    pub fn evict(&self, name: &str) -> Option<BoxedProvider> {
        self.adapters.remove(name).map(|(_, adapter)| adapter)
    }

    /// Cached provider names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.adapters.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for AdapterCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterCache")
            .field("adapters", &self.names())
            .finish()
    }
}

/// Builder for composing a generation service
pub struct GenerationServiceBuilder {
    factory: Arc<ProviderFactory>,
    cache: AdapterCache,
    layers: Vec<Arc<dyn DynLayer>>,
    overrides: HashMap<String, ProviderOptions>,
}

impl GenerationServiceBuilder {
    /// Create a new builder over a factory
    pub fn new(factory: Arc<ProviderFactory>) -> Self {
        Self {
            factory,
            cache: AdapterCache::new(),
            layers: Vec::new(),
            overrides: HashMap::new(),
        }
    }

    /// Use an externally owned cache
    pub fn cache(mut self, cache: AdapterCache) -> Self {
        self.cache = cache;
        self
    }

    /// Wrap every adapter the service constructs with a layer.
    ///
    /// Layers apply in order: the last one added is the outermost.
    pub fn layer<L: DynLayer + 'static>(mut self, layer: L) -> Self {
        self.layers.push(Arc::new(layer));
        self
    }

    /// Per-provider overrides passed to the factory on construction
    pub fn provider_options(mut self, name: impl Into<String>, options: ProviderOptions) -> Self {
        self.overrides.insert(name.into(), options);
        self
    }

    /// Finish building
    pub fn finish(self) -> GenerationService {
        GenerationService {
            factory: self.factory,
            cache: self.cache,
            layers: self.layers,
            overrides: self.overrides,
        }
    }
}

/// Façade dispatching generation, health and model-listing calls
pub struct GenerationService {
    factory: Arc<ProviderFactory>,
    cache: AdapterCache,
    layers: Vec<Arc<dyn DynLayer>>,
    overrides: HashMap<String, ProviderOptions>,
}

impl GenerationService {
    /// Create a service with a fresh cache and no layers
    pub fn new(factory: Arc<ProviderFactory>) -> Self {
        GenerationServiceBuilder::new(factory).finish()
    }

    /// Create a builder
    pub fn builder(factory: Arc<ProviderFactory>) -> GenerationServiceBuilder {
        GenerationServiceBuilder::new(factory)
    }

    /// The adapter cache owned by this service
    pub fn cache(&self) -> &AdapterCache {
        &self.cache
    }

    /// Registered provider names
    pub fn available_providers(&self) -> Vec<String> {
        self.factory.available_providers()
    }

    /// Get the cached adapter for `name`, constructing it on first use
    pub fn provider(&self, name: &str) -> Result<BoxedProvider, WeftError> {
        if let Some(adapter) = self.cache.get(name) {
            return Ok(adapter);
        }

        let options = self.overrides.get(name).cloned().unwrap_or_default();
        let adapter = match self.factory.create(name, options) {
            Ok(adapter) => adapter,
            Err(e) => {
                tracing::error!(provider = name, error = %e, "failed to create provider");
                return Err(e);
            }
        };

        let adapter = self
            .layers
            .iter()
            .fold(adapter, |inner, layer| layer.wrap(inner));

        tracing::info!(provider = name, "created provider");
        Ok(self.cache.get_or_insert(name, adapter))
    }

    /// Generate text with the provider named by the request.
    ///
    /// Adapter errors are returned unchanged.
    pub async fn generate(&self, req: &GenerationRequest) -> Result<GenerationResponse, WeftError> {
        let provider = self.provider(&req.provider)?;

        tracing::info!(
            provider = %req.provider,
            model = req.model.as_deref().unwrap_or("default"),
            "generating"
        );

        match provider.generate(req).await {
            Ok(response) => {
                tracing::info!(
                    provider = %response.provider,
                    model = %response.model,
                    chars = response.text.len(),
                    "generation finished"
                );
                Ok(response)
            }
            Err(e) => {
                tracing::error!(provider = %req.provider, error = %e, "generation failed");
                Err(e)
            }
        }
    }

    /// Health of one provider, or of every registered provider.
    ///
    /// Never fails: construction errors, failed probes and panicking probes all
    /// report `false` for that provider only.
    pub async fn health_check(&self, provider: Option<&str>) -> HashMap<String, bool> {
        let names = self.target_names(provider);

        let checks = names.into_iter().map(|name| async move {
            let healthy = match self.provider(&name) {
                Ok(adapter) => AssertUnwindSafe(adapter.health_check())
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| {
                        tracing::error!(provider = %name, "health check panicked");
                        false
                    }),
                Err(_) => false,
            };
            (name, healthy)
        });

        join_all(checks).await.into_iter().collect()
    }

    /// Model catalogs of one provider, or of every registered provider.
    ///
    /// A provider that cannot be constructed, or whose catalog panics, reports
    /// an empty list.
    pub fn list_models(&self, provider: Option<&str>) -> HashMap<String, Vec<String>> {
        self.target_names(provider)
            .into_iter()
            .map(|name| {
                let models = match self.provider(&name) {
                    Ok(adapter) => {
                        std::panic::catch_unwind(AssertUnwindSafe(|| adapter.list_models()))
                            .unwrap_or_else(|_| {
                                tracing::error!(provider = %name, "model listing panicked");
                                Vec::new()
                            })
                    }
                    Err(_) => Vec::new(),
                };
                (name, models)
            })
            .collect()
    }

    fn target_names(&self, provider: Option<&str>) -> Vec<String> {
        match provider {
            Some(name) => vec![name.to_string()],
            None => self.factory.available_providers(),
        }
    }
}

impl std::fmt::Debug for GenerationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationService")
            .field("factory", &self.factory)
            .field("cache", &self.cache)
            .field("layers", &self.layers.len())
            .finish()
    }
}
