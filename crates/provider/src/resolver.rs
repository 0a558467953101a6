//! Layered SLI configuration.
//!
//! Documents are merged project → stage → service, so a more specific scope
//! overrides individual indicators of a less specific one while keeping the
//! rest. Scopes without a document are skipped; any other store failure,
//! a malformed document, or a present-but-empty indicator set aborts the
//! whole resolution.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, info};

use crate::store::{ResourceStore, Scope, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to fetch SLI configuration for {scope}: {source}")]
    Store {
        scope: String,
        #[source]
        source: StoreError,
    },

    #[error("invalid SLI configuration for {scope}: {source}")]
    Malformed {
        scope: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("missing required field: indicators ({scope})")]
    MissingIndicators { scope: String },
}

/// On-disk document shape.
#[derive(Debug, Default, Deserialize)]
struct SliDocument {
    /// Informational; accepted as any scalar (`1.0` and `'1.0'` alike).
    #[serde(default)]
    spec_version: Option<serde_yaml::Value>,
    /// `None` when the key is absent or explicitly null.
    #[serde(default)]
    indicators: Option<IndexMap<String, String>>,
}

impl SliDocument {
    fn parse(raw: &str, scope: &Scope) -> Result<Self, ConfigError> {
        // An empty file is a document with no indicators, not a parse error.
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw).map_err(|source| ConfigError::Malformed {
            scope: scope.to_string(),
            source,
        })
    }
}

/// Merged indicator name → query template mapping. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectiveConfig {
    indicators: IndexMap<String, String>,
}

impl EffectiveConfig {
    /// Query template for `indicator`, if any scope defined one.
    pub fn get(&self, indicator: &str) -> Option<&str> {
        self.indicators.get(indicator).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.indicators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.indicators.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EffectiveConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            indicators: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Builds an [`EffectiveConfig`] from a [`ResourceStore`].
#[derive(Clone)]
pub struct ConfigResolver {
    store: Arc<dyn ResourceStore>,
}

impl ConfigResolver {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }

    /// Merge every applicable scope for the given coordinates.
    ///
    /// Zero applicable documents yields an empty config, not an error.
    pub async fn resolve(&self, project: &str, stage: &str, service: &str) -> Result<EffectiveConfig, ConfigError> {
        let mut merged = EffectiveConfig::default();

        for scope in Scope::chain(project, stage, service) {
            let raw = match self.store.get_document(&scope).await {
                Ok(raw) => raw,
                Err(e) if e.is_not_found() => {
                    debug!(%scope, "No SLI configuration at scope");
                    continue;
                }
                Err(source) => {
                    return Err(ConfigError::Store {
                        scope: scope.to_string(),
                        source,
                    })
                }
            };

            let doc = SliDocument::parse(&raw, &scope)?;
            let indicators = doc.indicators.unwrap_or_default();
            if indicators.is_empty() {
                return Err(ConfigError::MissingIndicators {
                    scope: scope.to_string(),
                });
            }

            debug!(
                %scope,
                spec_version = ?doc.spec_version,
                indicators = indicators.len(),
                "Merging SLI configuration"
            );
            merged.indicators.extend(indicators);
        }

        info!(
            project,
            stage,
            service,
            indicators = merged.len(),
            "Resolved SLI configuration"
        );
        Ok(merged)
    }
}
