//! Configuration: service settings, per-call provider overrides and credential
//! lookup.

use crate::error::WeftError;
use crate::provider::{GENERATION_TIMEOUT, HEALTH_CHECK_TIMEOUT};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Default region for the managed-inference provider
pub const DEFAULT_AWS_REGION: &str = "us-east-1";

/// Provider name -> environment variable holding its credential.
///
/// Providers mapped to `None` authenticate through ambient identity.
static CREDENTIAL_ENV_VARS: Lazy<HashMap<&'static str, Option<&'static str>>> = Lazy::new(|| {
    HashMap::from([
        ("bedrock", None),
        ("google", Some("GOOGLE_API_KEY")),
        ("openai", Some("OPENAI_API_KEY")),
    ])
});

/// Environment-scoped credential lookup keyed by provider name
pub trait CredentialSource: Send + Sync {
    fn credential(&self, provider: &str) -> Option<String>;
}

/// Reads credentials from the process environment
#[derive(Debug, Clone, Default)]
pub struct EnvCredentials;

impl EnvCredentials {
    /// Environment variable consulted for a provider, if any
    pub fn env_var(provider: &str) -> Option<String> {
        match CREDENTIAL_ENV_VARS.get(provider) {
            Some(var) => var.map(str::to_string),
            None => Some(format!("{}_API_KEY", provider.to_ascii_uppercase())),
        }
    }
}

impl CredentialSource for EnvCredentials {
    fn credential(&self, provider: &str) -> Option<String> {
        let var = Self::env_var(provider)?;
        std::env::var(var).ok().filter(|v| !v.trim().is_empty())
    }
}

/// In-memory credentials
#[derive(Clone, Default)]
pub struct StaticCredentials {
    keys: HashMap<String, String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the credential for a provider
    pub fn with(mut self, provider: impl Into<String>, key: impl Into<String>) -> Self {
        self.keys.insert(provider.into(), key.into());
        self
    }
}

impl fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("providers", &self.keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CredentialSource for StaticCredentials {
    fn credential(&self, provider: &str) -> Option<String> {
        self.keys
            .get(provider)
            .filter(|v| !v.trim().is_empty())
            .cloned()
    }
}

/// Per-call overrides accepted by the provider factory
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderOptions {
    /// Explicit credential; takes precedence over the credential source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Region for region-scoped providers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Override of the provider endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Generation time bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,

    /// Health probe time bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_timeout: Option<Duration>,

    /// Provider-specific extras
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl ProviderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = Some(timeout);
        self
    }

    /// Generation timeout, or the default
    pub fn generation_timeout(&self) -> Duration {
        self.timeout.unwrap_or(GENERATION_TIMEOUT)
    }

    /// Health probe timeout, or the default
    pub fn health_check_timeout(&self) -> Duration {
        self.health_timeout.unwrap_or(HEALTH_CHECK_TIMEOUT)
    }

    /// Fill unset fields from `defaults`
    pub fn merged_with(mut self, defaults: &ProviderOptions) -> Self {
        if self.api_key.is_none() {
            self.api_key = defaults.api_key.clone();
        }
        if self.region.is_none() {
            self.region = defaults.region.clone();
        }
        if self.base_url.is_none() {
            self.base_url = defaults.base_url.clone();
        }
        if self.timeout.is_none() {
            self.timeout = defaults.timeout;
        }
        if self.health_timeout.is_none() {
            self.health_timeout = defaults.health_timeout;
        }
        for (k, v) in &defaults.extra {
            self.extra.entry(k.clone()).or_insert_with(|| v.clone());
        }
        self
    }
}

impl fmt::Debug for ProviderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderOptions")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("region", &self.region)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("health_timeout", &self.health_timeout)
            .field("extra", &self.extra)
            .finish()
    }
}

/// Service-wide settings
#[derive(Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub google_api_key: Option<String>,

    #[serde(default)]
    pub openai_api_key: Option<String>,

    #[serde(default = "default_region")]
    pub aws_region: String,

    #[serde(default = "default_generation_timeout")]
    pub generation_timeout: Duration,

    #[serde(default = "default_health_timeout")]
    pub health_check_timeout: Duration,

    /// Default filter directive for binaries installing a subscriber
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_region() -> String {
    DEFAULT_AWS_REGION.to_string()
}

fn default_generation_timeout() -> Duration {
    GENERATION_TIMEOUT
}

fn default_health_timeout() -> Duration {
    HEALTH_CHECK_TIMEOUT
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            google_api_key: None,
            openai_api_key: None,
            aws_region: default_region(),
            generation_timeout: default_generation_timeout(),
            health_check_timeout: default_health_timeout(),
            log_level: default_log_level(),
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("google_api_key", &self.google_api_key.as_ref().map(|_| "***"))
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "***"))
            .field("aws_region", &self.aws_region)
            .field("generation_timeout", &self.generation_timeout)
            .field("health_check_timeout", &self.health_check_timeout)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Settings {
    /// Load settings from the process environment
    pub fn from_env() -> Result<Self, WeftError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, WeftError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let secs = |key: &str, default: Duration| -> Result<Duration, WeftError> {
            match get(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|e| WeftError::configuration(format!("{}: {}", key, e))),
                None => Ok(default),
            }
        };

        Ok(Self {
            google_api_key: get("GOOGLE_API_KEY"),
            openai_api_key: get("OPENAI_API_KEY"),
            aws_region: get("AWS_REGION").unwrap_or_else(default_region),
            generation_timeout: secs("WEFT_GENERATION_TIMEOUT_SECS", GENERATION_TIMEOUT)?,
            health_check_timeout: secs("WEFT_HEALTH_TIMEOUT_SECS", HEALTH_CHECK_TIMEOUT)?,
            log_level: get("WEFT_LOG_LEVEL")
                .map(|v| v.to_lowercase())
                .unwrap_or_else(default_log_level),
        })
    }

    /// Credentials held by these settings
    pub fn credentials(&self) -> StaticCredentials {
        let mut creds = StaticCredentials::new();
        if let Some(key) = &self.google_api_key {
            creds = creds.with("google", key.clone());
        }
        if let Some(key) = &self.openai_api_key {
            creds = creds.with("openai", key.clone());
        }
        creds
    }

    /// Factory defaults derived from these settings
    pub fn provider_defaults(&self) -> ProviderOptions {
        ProviderOptions::new()
            .with_region(self.aws_region.clone())
            .with_timeout(self.generation_timeout)
            .with_health_timeout(self.health_check_timeout)
    }
}
