//! Per-indicator evaluation.
//!
//! Each requested indicator goes through template lookup, rendering, and a
//! search job's submit → poll → fetch cycle, then value extraction. Indicators
//! run concurrently up to a configured limit, and the results come back in
//! request order. A failure at any step becomes a failed [`SliResult`] for
//! that indicator only.
//!
//! One deadline covers the whole batch. Indicators still pending when it
//! passes are recorded as timed out, whether they were waiting for a worker
//! slot or for the backend. Jobs they had already submitted are cancelled.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use futures::future::join_all;
use sli_core::config::Config;
use sli_core::{EvaluationContext, SliResult, TimeWindow, WindowError};
use sli_search::{extract_value, JobHandle, SearchError, SearchJobClient};
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::resolver::EffectiveConfig;
use crate::templater::{self, TemplateError};

#[derive(Debug, Clone, thiserror::Error)]
pub enum IndicatorError {
    #[error("invalid time window: {0}")]
    Window(#[from] WindowError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error("timed out: evaluation deadline exceeded after {seconds}s")]
    DeadlineExceeded { seconds: u64 },
}

/// Timing and parallelism for one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluatorSettings {
    pub poll_interval: Duration,
    pub job_timeout: Duration,
    pub deadline: Duration,
    pub concurrency: usize,
}

impl EvaluatorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: config.splunk.poll_interval(),
            job_timeout: config.splunk.job_timeout(),
            deadline: config.evaluation.deadline(),
            concurrency: config.evaluation.concurrency,
        }
    }
}

impl Default for EvaluatorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            job_timeout: Duration::from_secs(300),
            deadline: Duration::from_secs(600),
            concurrency: 4,
        }
    }
}

pub struct IndicatorEvaluator {
    client: Arc<dyn SearchJobClient>,
    settings: EvaluatorSettings,
}

impl IndicatorEvaluator {
    pub fn new(client: Arc<dyn SearchJobClient>, settings: EvaluatorSettings) -> Self {
        Self { client, settings }
    }

    /// Evaluate `indicators` against `config`. Always returns one result per
    /// requested name, in the same order.
    pub async fn evaluate_all(
        &self,
        ctx: &EvaluationContext,
        config: &EffectiveConfig,
        indicators: &[String],
    ) -> Vec<SliResult> {
        // Parsed once; a bad window fails every indicator with the same error.
        let window = TimeWindow::parse(&ctx.start, &ctx.end);
        if let Err(e) = &window {
            warn!(start = %ctx.start, end = %ctx.end, error = %e, "Invalid evaluation window");
        }

        let deadline = Instant::now() + self.settings.deadline;
        let permits = Semaphore::new(self.settings.concurrency.max(1));

        let tasks = indicators.iter().map(|name| {
            let window = &window;
            let permits = &permits;
            async move {
                let submitted = OnceLock::new();
                let work = async {
                    // The semaphore is never closed, so a permit always arrives.
                    let _permit = permits.acquire().await.ok();
                    self.evaluate_one(name, ctx, config, window, &submitted).await
                };
                let outcome = match tokio::time::timeout_at(deadline, work).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        if let Some(handle) = submitted.get() {
                            self.cancel_abandoned(name, handle).await;
                        }
                        Err(IndicatorError::DeadlineExceeded {
                            seconds: self.settings.deadline.as_secs(),
                        })
                    }
                };
                into_result(name, outcome)
            }
        });

        join_all(tasks).await
    }

    async fn evaluate_one(
        &self,
        name: &str,
        ctx: &EvaluationContext,
        config: &EffectiveConfig,
        window: &Result<TimeWindow, WindowError>,
        submitted: &OnceLock<JobHandle>,
    ) -> Result<f64, IndicatorError> {
        let window = window.as_ref().map_err(|e| IndicatorError::Window(e.clone()))?;
        let query = templater::render_indicator(config, name, ctx, window)?;
        debug!(indicator = name, query = %query, "Rendered indicator query");

        let handle = self.client.submit(&query, window).await?;
        debug!(indicator = name, sid = %handle, "Submitted search job");
        let _ = submitted.set(handle.clone());

        self.client
            .await_completion(&handle, self.settings.poll_interval, self.settings.job_timeout)
            .await?;
        let rows = self.client.fetch_results(&handle).await?;

        Ok(extract_value(&rows, name)?)
    }
}

impl IndicatorEvaluator {
    async fn cancel_abandoned(&self, name: &str, handle: &JobHandle) {
        match self.client.cancel(handle).await {
            Ok(()) => info!(indicator = name, sid = %handle, "Cancelled search job after deadline"),
            Err(e) => warn!(indicator = name, sid = %handle, error = %e, "Failed to cancel search job"),
        }
    }
}

fn into_result(name: &str, outcome: Result<f64, IndicatorError>) -> SliResult {
    match outcome {
        Ok(value) => {
            info!(indicator = name, value, "Retrieved indicator value");
            SliResult::success(name, value)
        }
        Err(e) => {
            warn!(indicator = name, error = %e, "Failed to retrieve indicator");
            SliResult::failure(name, e.to_string())
        }
    }
}
