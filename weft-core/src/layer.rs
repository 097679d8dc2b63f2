//! Layer trait and abstractions.
//!
//! Layers wrap an adapter with cross-cutting behavior (logging, caller-side
//! retry, ...) and return another adapter.

use crate::error::WeftError;
use crate::provider::{BoxedProvider, Provider};
use crate::types::*;
use async_trait::async_trait;
use std::sync::Arc;

/// Layer trait for wrapping providers.
///
/// Each layer wraps an inner provider and returns a new provider with enhanced
/// capabilities.
pub trait Layer<P: Provider> {
    /// The type of the layered provider
    type LayeredProvider: Provider;

    /// Wrap the inner provider with this layer
    fn layer(&self, inner: P) -> Self::LayeredProvider;
}

/// Type-erased layer, applied by the generation service to every adapter it
/// constructs.
pub trait DynLayer: Send + Sync {
    fn wrap(&self, inner: BoxedProvider) -> BoxedProvider;
}

impl<L> DynLayer for L
where
    L: Layer<BoxedProvider> + Send + Sync,
{
    fn wrap(&self, inner: BoxedProvider) -> BoxedProvider {
        Arc::new(self.layer(inner))
    }
}

/// Helper trait for layered providers.
///
/// Provides default forwarding implementations for provider methods.
/// Implementers only need to override the methods they want to intercept.
#[async_trait]
pub trait LayeredProvider: Sized + Provider {
    /// The inner provider type
    type Inner: Provider;

    /// Get a reference to the inner provider
    fn inner(&self) -> &Self::Inner;

    /// Default implementation for info - forwards to inner
    fn layered_info(&self) -> Arc<ProviderInfo> {
        self.inner().info()
    }

    /// Default implementation for generate - forwards to inner
    async fn layered_generate(
        &self,
        req: &GenerationRequest,
    ) -> Result<GenerationResponse, WeftError> {
        self.inner().generate(req).await
    }

    /// Default implementation for health_check - forwards to inner
    async fn layered_health_check(&self) -> bool {
        self.inner().health_check().await
    }

    /// Default implementation for list_models - forwards to inner
    fn layered_list_models(&self) -> Vec<String> {
        self.inner().list_models()
    }

    /// Default implementation for default_model - forwards to inner
    fn layered_default_model(&self) -> String {
        self.inner().default_model()
    }
}

/// Macro to implement Provider trait by forwarding to LayeredProvider methods.
///
/// This reduces boilerplate for layered providers.
#[macro_export]
macro_rules! impl_layered_provider {
    ($type:ident) => {
        #[async_trait::async_trait]
        impl<P: $crate::provider::Provider> $crate::provider::Provider for $type<P> {
            fn info(&self) -> std::sync::Arc<$crate::types::ProviderInfo> {
                $crate::layer::LayeredProvider::layered_info(self)
            }

            async fn generate(
                &self,
                req: &$crate::types::GenerationRequest,
            ) -> Result<$crate::types::GenerationResponse, $crate::error::WeftError> {
                $crate::layer::LayeredProvider::layered_generate(self, req).await
            }

            async fn health_check(&self) -> bool {
                $crate::layer::LayeredProvider::layered_health_check(self).await
            }

            fn list_models(&self) -> Vec<String> {
                $crate::layer::LayeredProvider::layered_list_models(self)
            }

            fn default_model(&self) -> String {
                $crate::layer::LayeredProvider::layered_default_model(self)
            }
        }
    };
}
