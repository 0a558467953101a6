//! Per-indicator outcomes and the evaluation report returned to the caller.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::request::GetSliRequest;

/// Report message attached when every indicator failed.
pub const FAILED_REPORT_MESSAGE: &str = "unable to retrieve metrics";

/// Overall health of one evaluation batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Warning,
    Fail,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Pass => "pass",
            Verdict::Warning => "warning",
            Verdict::Fail => "fail",
        };
        f.write_str(s)
    }
}

/// Outcome for a single requested indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliResult {
    pub metric: String,
    /// Only meaningful when `success` is true.
    pub value: f64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SliResult {
    pub fn success(metric: impl Into<String>, value: f64) -> Self {
        Self {
            metric: metric.into(),
            value,
            success: true,
            message: None,
        }
    }

    pub fn failure(metric: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            value: 0.0,
            success: false,
            message: Some(message.into()),
        }
    }
}

/// The `get-sli` block of a finished report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetSliFinished {
    pub start: String,
    pub end: String,
    pub indicator_values: Vec<SliResult>,
}

/// Terminal output of one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub project: String,
    pub stage: String,
    pub service: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub status: String,
    pub result: Verdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "get-sli")]
    pub get_sli: GetSliFinished,
}

impl EvaluationReport {
    /// Assemble a report for `request`; the message is set only on [`Verdict::Fail`].
    pub fn new(request: &GetSliRequest, verdict: Verdict, results: Vec<SliResult>) -> Self {
        Self {
            project: request.project.clone(),
            stage: request.stage.clone(),
            service: request.service.clone(),
            labels: request.labels.clone(),
            status: "succeeded".to_string(),
            result: verdict,
            message: (verdict == Verdict::Fail).then(|| FAILED_REPORT_MESSAGE.to_string()),
            get_sli: GetSliFinished {
                start: request.get_sli.start.clone(),
                end: request.get_sli.end.clone(),
                indicator_values: results,
            },
        }
    }

    /// Report for an evaluation that could not start, e.g. because its
    /// query configuration was unusable. Carries no indicator values.
    pub fn errored(request: &GetSliRequest, message: impl Into<String>) -> Self {
        Self {
            project: request.project.clone(),
            stage: request.stage.clone(),
            service: request.service.clone(),
            labels: request.labels.clone(),
            status: "errored".to_string(),
            result: Verdict::Fail,
            message: Some(message.into()),
            get_sli: GetSliFinished {
                start: request.get_sli.start.clone(),
                end: request.get_sli.end.clone(),
                indicator_values: Vec::new(),
            },
        }
    }

    pub fn verdict(&self) -> Verdict {
        self.result
    }

    pub fn results(&self) -> &[SliResult] {
        &self.get_sli.indicator_values
    }
}
