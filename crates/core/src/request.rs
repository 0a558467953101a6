//! Inbound get-sli request and the evaluation context derived from it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Deployment type used when neither the request nor its labels name one.
pub const DEFAULT_DEPLOYMENT: &str = "primary";

/// Label consulted when the request carries no explicit deployment type.
pub const DEPLOYMENT_LABEL: &str = "deployment";

/// A `{key, value}` substitution supplied with the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFilter {
    pub key: String,
    pub value: String,
}

impl CustomFilter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// The `get-sli` block of a triggering request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetSliData {
    #[serde(default)]
    pub sli_provider: String,
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub indicators: Vec<String>,
    #[serde(default)]
    pub custom_filters: Vec<CustomFilter>,
}

/// A get-sli request as delivered by the orchestration layer.
///
/// ```json
/// {
///   "project": "sockshop",
///   "stage": "staging",
///   "service": "carts",
///   "deployment": "canary",
///   "labels": { "owner": "team-a" },
///   "get-sli": {
///     "sliProvider": "splunk",
///     "start": "2024-01-01T00:00:00Z",
///     "end": "2024-01-01T00:05:00Z",
///     "indicators": ["error_rate"],
///     "customFilters": [{ "key": "region", "value": "eu-west-1" }]
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetSliRequest {
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub stage: String,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub deployment: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(rename = "get-sli")]
    pub get_sli: GetSliData,
}

impl GetSliRequest {
    /// Deployment type for query rendering.
    ///
    /// The explicit field wins; otherwise the `deployment` label; otherwise
    /// [`DEFAULT_DEPLOYMENT`].
    pub fn resolve_deployment(&self) -> String {
        if !self.deployment.is_empty() {
            return self.deployment.clone();
        }
        if let Some(label) = self.labels.get(DEPLOYMENT_LABEL) {
            tracing::info!(deployment = %label, "deployment not set on request, using label");
            return label.clone();
        }
        tracing::warn!("no deployment type specified, defaulting to \"{DEFAULT_DEPLOYMENT}\"");
        DEFAULT_DEPLOYMENT.to_string()
    }

    /// Freeze the request into the context shared by every indicator.
    pub fn context(&self) -> EvaluationContext {
        EvaluationContext {
            project: self.project.clone(),
            stage: self.stage.clone(),
            service: self.service.clone(),
            deployment: self.resolve_deployment(),
            labels: self.labels.clone(),
            custom_filters: self.get_sli.custom_filters.clone(),
            start: self.get_sli.start.clone(),
            end: self.get_sli.end.clone(),
        }
    }
}

/// Run-time values available to query templates for one evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationContext {
    pub project: String,
    pub stage: String,
    pub service: String,
    pub deployment: String,
    pub labels: BTreeMap<String, String>,
    /// Applied in order during rendering.
    pub custom_filters: Vec<CustomFilter>,
    /// Window bounds exactly as received.
    pub start: String,
    pub end: String,
}
