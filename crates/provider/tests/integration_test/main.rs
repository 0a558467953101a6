//! End-to-end tests for the get-sli pipeline.

mod pipeline;

use std::time::Duration;

use serde_json::{json, Value};
use sli_core::GetSliRequest;
use sli_provider::EvaluatorSettings;
use sli_search::ResultRow;

/// A request for `indicators` over a five minute window.
pub fn request(indicators: &[&str]) -> GetSliRequest {
    request_with(indicators, json!({}))
}

/// Like [`request`], with top-level fields from `extra` merged in.
pub fn request_with(indicators: &[&str], extra: Value) -> GetSliRequest {
    let mut body = json!({
        "project": "sockshop",
        "stage": "staging",
        "service": "carts",
        "get-sli": {
            "sliProvider": "splunk",
            "start": "2024-01-01T00:00:00Z",
            "end": "2024-01-01T00:05:00Z",
            "indicators": indicators,
        }
    });
    if let (Some(target), Some(fields)) = (body.as_object_mut(), extra.as_object()) {
        for (k, v) in fields {
            target.insert(k.clone(), v.clone());
        }
    }
    serde_json::from_value(body).unwrap()
}

pub fn row(field: &str, value: Value) -> Vec<ResultRow> {
    let mut row = ResultRow::new();
    row.insert(field.to_string(), value);
    vec![row]
}

pub fn fast_settings() -> EvaluatorSettings {
    EvaluatorSettings {
        poll_interval: Duration::from_millis(100),
        job_timeout: Duration::from_secs(5),
        deadline: Duration::from_secs(60),
        concurrency: 3,
    }
}
