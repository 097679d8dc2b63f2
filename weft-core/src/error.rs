//! Error types for weft operations.
//!
//! Provider failures form a flat taxonomy (generic, timeout, rate limit, quota),
//! each tagged with the provider name. Caller errors (`InvalidRequest`,
//! `UnknownProvider`) are kept apart so they are never mistaken for a provider
//! failure.

/// How a caller can recover from an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Transient; the same request may be sent again right away.
    RetryNow,
    /// Throttled or out of quota; retry after a backoff, possibly elsewhere.
    RetryAfterBackoff,
    /// Retrying without changing the request will not help.
    DoNotRetry,
}

/// The main error type for weft operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WeftError {
    /// Generic provider failure
    #[error("[{provider}] {message}")]
    Provider {
        provider: String,
        message: String,
        code: Option<String>,
    },

    /// Remote call exceeded its time bound
    #[error("[{provider}] {message}")]
    Timeout { provider: String, message: String },

    /// Remote throttling signal
    #[error("[{provider}] {message}")]
    RateLimit { provider: String, message: String },

    /// Remote quota or billing limit signal
    #[error("[{provider}] {message}")]
    QuotaExceeded { provider: String, message: String },

    /// Request failed local validation
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No adapter is registered under this name
    #[error("Unsupported provider '{name}'. Available: {}", .available.join(", "))]
    UnknownProvider {
        name: String,
        available: Vec<String>,
    },

    /// Adapter could not be configured
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A pending completion was abandoned before it resolved
    #[error("Canceled: {0}")]
    Canceled(String),
}

impl WeftError {
    /// Create a generic provider error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
            code: None,
        }
    }

    /// Create a generic provider error carrying the vendor error code
    pub fn provider_with_code(
        provider: impl Into<String>,
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
            code: Some(code.into()),
        }
    }

    /// Create a timeout error
    pub fn timeout(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Timeout {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a rate limit error
    pub fn rate_limit(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RateLimit {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a quota exceeded error
    pub fn quota_exceeded(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::QuotaExceeded {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create an invalid request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a canceled error
    pub fn canceled(msg: impl Into<String>) -> Self {
        Self::Canceled(msg.into())
    }

    /// Name of the provider that raised this error, if any
    pub fn provider_name(&self) -> Option<&str> {
        match self {
            Self::Provider { provider, .. }
            | Self::Timeout { provider, .. }
            | Self::RateLimit { provider, .. }
            | Self::QuotaExceeded { provider, .. } => Some(provider),
            _ => None,
        }
    }

    /// Human-readable message without the provider tag
    pub fn message(&self) -> String {
        match self {
            Self::Provider { message, .. }
            | Self::Timeout { message, .. }
            | Self::RateLimit { message, .. }
            | Self::QuotaExceeded { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Check if the caller is at fault (bad request or unknown provider)
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            WeftError::InvalidRequest(_) | WeftError::UnknownProvider { .. }
        )
    }

    /// Check if this is a retryable error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WeftError::Timeout { .. } | WeftError::RateLimit { .. } | WeftError::QuotaExceeded { .. }
        )
    }

    /// Recovery guidance for the boundary sitting above this crate
    pub fn recovery(&self) -> Recovery {
        match self {
            WeftError::Timeout { .. } => Recovery::RetryNow,
            WeftError::RateLimit { .. } | WeftError::QuotaExceeded { .. } => {
                Recovery::RetryAfterBackoff
            }
            _ => Recovery::DoNotRetry,
        }
    }
}
