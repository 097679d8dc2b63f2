//! # Weft Providers
//!
//! Provider adapters for the weft generation contract:
//!
//! - [`bedrock`]: AWS Bedrock, three model families behind one runtime
//! - [`gemini`]: Google Gemini, streamed with search/maps grounding and retry
//! - [`openai`]: OpenAI chat completions

pub mod bedrock;
pub mod gemini;
pub mod openai;

// Re-exports
pub use bedrock::BedrockProvider;
pub use gemini::GeminiProvider;
pub use openai::{OpenAiBuilder, OpenAiProvider};

use std::sync::Arc;
use weft_core::{BoxedProvider, ProviderFactory, Registration, Settings};

/// Register the built-in adapters under `bedrock`, `google` and `openai`.
///
/// Bedrock authenticates through ambient identity; the other two require a
/// credential.
pub fn register_builtin(factory: &ProviderFactory) {
    factory.register(
        bedrock::PROVIDER_ID,
        Registration::ambient(|config| {
            BedrockProvider::from_config(config).map(|p| Arc::new(p) as BoxedProvider)
        }),
    );
    factory.register(
        gemini::PROVIDER_ID,
        Registration::new(|config| {
            GeminiProvider::from_config(config).map(|p| Arc::new(p) as BoxedProvider)
        }),
    );
    factory.register(
        openai::PROVIDER_ID,
        Registration::new(|config| {
            OpenAiProvider::from_config(config).map(|p| Arc::new(p) as BoxedProvider)
        }),
    );
}

/// A factory with the built-in adapters, credentials and defaults taken from
/// `settings`
pub fn default_factory(settings: &Settings) -> ProviderFactory {
    let factory = ProviderFactory::new()
        .with_credentials(settings.credentials())
        .with_defaults(settings.provider_defaults());
    register_builtin(&factory);
    factory
}
