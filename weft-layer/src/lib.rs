//! # Weft Layers
//!
//! Built-in layers for weft adapters.
//!
//! Currently implemented layers:
//! - `LoggingLayer`: Logs every generation and health probe with timing information
//! - `RetryLayer`: Caller-side retry with exponential backoff for retryable errors
//!
//! ## Usage
//!
//! ```ignore
//! use weft_core::GenerationService;
//! use weft_layer::{LoggingLayer, RetryLayer};
//!
//! let service = GenerationService::builder(factory)
//!     .layer(RetryLayer::new().with_max_retries(3))
//!     .layer(LoggingLayer::new())
//!     .finish();
//! ```

pub mod logging;
pub mod retry;

// Re-exports
pub use logging::{LoggingLayer, LoggingProvider};
pub use retry::{RetryLayer, RetryProvider};
