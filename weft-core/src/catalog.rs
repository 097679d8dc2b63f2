//! Static model catalogs and model resolution.

use std::collections::HashMap;

/// A model chosen for a request: the catalog key and the id sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModel {
    pub key: String,
    pub wire_id: String,
    /// True when the requested model was unknown and the default was used
    pub fell_back: bool,
}

/// Ordered catalog of model keys, their wire ids, backward-compatibility
/// aliases and the adapter default.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: Vec<(String, String)>,
    aliases: HashMap<String, String>,
    default_model: String,
}

impl ModelCatalog {
    /// Create a catalog from `(key, wire_id)` pairs.
    ///
    /// `default_model` must be one of the keys; when it is not, the first
    /// entry becomes the default.
    pub fn new<K, W>(models: impl IntoIterator<Item = (K, W)>, default_model: &str) -> Self
    where
        K: Into<String>,
        W: Into<String>,
    {
        let models: Vec<(String, String)> = models
            .into_iter()
            .map(|(k, w)| (k.into(), w.into()))
            .collect();

        let default_model = if models.iter().any(|(k, _)| k == default_model) {
            default_model.to_string()
        } else {
            models.first().map(|(k, _)| k.clone()).unwrap_or_default()
        };

        Self {
            models,
            aliases: HashMap::new(),
            default_model,
        }
    }

    /// Add a backward-compatibility alias pointing at a catalog key
    pub fn with_alias(mut self, alias: impl Into<String>, key: impl Into<String>) -> Self {
        self.aliases.insert(alias.into(), key.into());
        self
    }

    /// Default model key
    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Model keys in catalog order
    pub fn keys(&self) -> Vec<String> {
        self.models.iter().map(|(k, _)| k.clone()).collect()
    }

    /// Wire id for a catalog key
    pub fn wire_id(&self, key: &str) -> Option<&str> {
        self.models
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, w)| w.as_str())
    }

    /// Resolve the effective model: explicit key, then alias table, then default
    pub fn resolve(&self, requested: Option<&str>) -> ResolvedModel {
        let candidate = requested.unwrap_or(&self.default_model);
        let key = self
            .aliases
            .get(candidate)
            .map(String::as_str)
            .unwrap_or(candidate);

        if let Some(wire_id) = self.wire_id(key) {
            return ResolvedModel {
                key: key.to_string(),
                wire_id: wire_id.to_string(),
                fell_back: false,
            };
        }

        ResolvedModel {
            key: self.default_model.clone(),
            wire_id: self
                .wire_id(&self.default_model)
                .unwrap_or(&self.default_model)
                .to_string(),
            fell_back: true,
        }
    }
}
