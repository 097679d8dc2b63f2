//! # Weft
//!
//! One generation contract over heterogeneous text-generation providers.
//!
//! Weft accepts a provider-agnostic [`GenerationRequest`], routes it to the
//! named adapter (AWS Bedrock, Google Gemini or OpenAI), and returns a
//! normalized [`GenerationResponse`] or a [`WeftError`] from one taxonomy.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! weft = { version = "0.1", features = ["full"] }
//! ```
//!
//! ```ignore
//! use std::sync::Arc;
//! use weft::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let settings = Settings::from_env()?;
//! let factory = Arc::new(default_factory(&settings));
//!
//! let service = GenerationService::builder(factory)
//!     .layer(RetryLayer::new())
//!     .layer(LoggingLayer::new())
//!     .finish();
//!
//! let req = GenerationRequest::new("google", "What is Rust?").with_search(true);
//! let resp = service.generate(&req).await?;
//! println!("{}", resp.text);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `default`: `providers` and `layers`
//! - `providers`: Built-in adapters and [`provider::default_factory`]
//! - `layers`: Logging and caller-side retry layers
//! - `schema`: JSON schema derivation for the boundary types
//! - `full`: All features enabled

// Re-export core types and traits
pub use weft_core::*;

// Re-export adapters under `provider` module
#[cfg(feature = "providers")]
pub mod provider {
    //! Provider adapter implementations.
    pub use weft_provider::*;
}

// Re-export layers under `layer` module
#[cfg(feature = "layers")]
pub mod layer {
    //! Built-in adapter layers.
    pub use weft_core::layer::*;
    pub use weft_layer::*;
}

/// Prelude module for convenient imports
pub mod prelude {
    //! Prelude module containing the most commonly used types and traits.
    //!
    //! ```
    //! use weft::prelude::*;
    //! ```

    pub use crate::{
        GenerationRequest, GenerationResponse, GenerationService, Layer, Priority,
        PriorityEnvelope, Provider, ProviderFactory, ProviderOptions, Recovery, Result, Settings,
        Usage, WeftError,
    };

    #[cfg(feature = "providers")]
    pub use crate::provider::{
        default_factory, register_builtin, BedrockProvider, GeminiProvider, OpenAiProvider,
    };

    #[cfg(feature = "layers")]
    pub use crate::layer::{LoggingLayer, RetryLayer};
}
