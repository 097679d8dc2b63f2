//! # Weft Core
//!
//! Core abstractions for the weft text-generation gateway.
//!
//! This crate provides the canonical request/response types, the error
//! taxonomy, the [`Provider`] trait every adapter implements, the open
//! provider registry and the [`GenerationService`] façade with its adapter
//! cache.

pub mod catalog;
pub mod config;
pub mod envelope;
pub mod error;
pub mod factory;
pub mod layer;
pub mod provider;
pub mod retry;
pub mod service;
pub mod types;

// Re-exports
pub use catalog::{ModelCatalog, ResolvedModel};
pub use config::{CredentialSource, EnvCredentials, ProviderOptions, Settings, StaticCredentials};
pub use envelope::{CompletionHandle, Priority, PriorityEnvelope};
pub use error::{Recovery, WeftError};
pub use factory::{ProviderConfig, ProviderFactory, Registration};
pub use layer::{DynLayer, Layer, LayeredProvider};
pub use provider::{BoxedProvider, Provider};
pub use retry::{RetrySignal, StreamRetryPolicy};
pub use service::{AdapterCache, GenerationService, GenerationServiceBuilder};
pub use types::*;

/// Result type alias for generation operations
pub type Result<T> = std::result::Result<T, WeftError>;
