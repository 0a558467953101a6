//! Request → report pipeline.

use std::sync::Arc;

use sli_core::config::Config;
use sli_core::{EvaluationReport, GetSliRequest, SliResult};
use sli_search::{SearchBackend, SearchEndpoint};
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::aggregate::aggregate;
use crate::credentials::{self, CredentialProvider};
use crate::evaluator::{EvaluatorSettings, IndicatorEvaluator};
use crate::resolver::{ConfigError, ConfigResolver};
use crate::store::ResourceStore;

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("failed to decode get-sli request: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("unable to retrieve custom queries for project {project}: {source}")]
    Config {
        project: String,
        #[source]
        source: ConfigError,
    },
}

/// Evaluates get-sli requests.
///
/// Shared state is limited to the store, credential provider and search
/// backend; everything else is built per request.
pub struct GetSliHandler {
    resolver: ConfigResolver,
    credentials: Arc<dyn CredentialProvider>,
    backend: Arc<dyn SearchBackend>,
    default_endpoint: SearchEndpoint,
    settings: EvaluatorSettings,
}

impl GetSliHandler {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        credentials: Arc<dyn CredentialProvider>,
        backend: Arc<dyn SearchBackend>,
        default_endpoint: SearchEndpoint,
        settings: EvaluatorSettings,
    ) -> Self {
        Self {
            resolver: ConfigResolver::new(store),
            credentials,
            backend,
            default_endpoint,
            settings,
        }
    }

    pub fn from_config(
        config: &Config,
        store: Arc<dyn ResourceStore>,
        credentials: Arc<dyn CredentialProvider>,
        backend: Arc<dyn SearchBackend>,
    ) -> Self {
        Self::new(
            store,
            credentials,
            backend,
            credentials::default_endpoint(&config.splunk),
            EvaluatorSettings::from_config(config),
        )
    }

    /// Decode a JSON request and evaluate it.
    pub async fn handle_json(&self, payload: &str) -> Result<EvaluationReport, HandlerError> {
        let request: GetSliRequest = serde_json::from_str(payload)?;
        self.handle(&request).await
    }

    /// Evaluate one request.
    ///
    /// Only configuration errors are returned as `Err`; every per-indicator
    /// problem is reported inside the returned report.
    pub async fn handle(&self, request: &GetSliRequest) -> Result<EvaluationReport, HandlerError> {
        let span = info_span!(
            "evaluation",
            id = %Uuid::new_v4(),
            project = %request.project,
            stage = %request.stage,
            service = %request.service,
        );

        self.evaluate(request).instrument(span).await
    }

    async fn evaluate(&self, request: &GetSliRequest) -> Result<EvaluationReport, HandlerError> {
        info!(
            indicators = request.get_sli.indicators.len(),
            start = %request.get_sli.start,
            end = %request.get_sli.end,
            "Evaluating SLIs"
        );

        let endpoint = self
            .credentials
            .lookup(&request.project)
            .await
            .into_endpoint(&request.project, &self.default_endpoint);

        let ctx = request.context();

        let config = self
            .resolver
            .resolve(&request.project, &request.stage, &request.service)
            .await
            .map_err(|source| {
                error!(error = %source, "Failed to resolve SLI configuration");
                HandlerError::Config {
                    project: request.project.clone(),
                    source,
                }
            })?;

        let indicators = &request.get_sli.indicators;
        let results = match self.backend.client_for(&endpoint) {
            Ok(client) => {
                IndicatorEvaluator::new(client, self.settings)
                    .evaluate_all(&ctx, &config, indicators)
                    .await
            }
            Err(e) => {
                error!(host = %endpoint.host, error = %e, "Search backend unavailable");
                indicators
                    .iter()
                    .map(|name| SliResult::failure(name, e.to_string()))
                    .collect()
            }
        };

        let verdict = aggregate(&results);
        let failed = results.iter().filter(|r| !r.success).count();
        info!(result = %verdict, total = results.len(), failed, "Evaluation finished");

        Ok(EvaluationReport::new(request, verdict, results))
    }
}
