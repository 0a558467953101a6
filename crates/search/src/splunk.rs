//! Splunk REST search-job client.
//!
//! Talks to the management API (`/services/search/jobs`) with bearer-token
//! auth:
//! 1. `POST /services/search/jobs` creates a job and returns its `sid`
//! 2. `GET /services/search/jobs/{sid}` reports `dispatchState`
//! 3. `GET /services/search/jobs/{sid}/results` lists result rows
//! 4. `POST /services/search/jobs/{sid}/control` with `action=cancel`

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use sli_core::config::SplunkConfig;
use sli_core::TimeWindow;
use tracing::{debug, info};
use url::Url;

use crate::client::{
    JobHandle, JobState, JobStatus, SearchBackend, SearchEndpoint, SearchError, SearchJobClient,
};
use crate::result::ResultRow;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CreateJobResponse {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct JobStatusResponse {
    #[serde(default)]
    entry: Vec<JobEntry>,
}

#[derive(Debug, Deserialize)]
struct JobEntry {
    content: JobContent,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobContent {
    dispatch_state: String,
    #[serde(default)]
    is_failed: bool,
    #[serde(default)]
    messages: Value,
}

#[derive(Debug, Deserialize)]
struct ResultsResponse {
    #[serde(default)]
    results: Vec<ResultRow>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// [`SearchJobClient`] for one Splunk deployment.
///
/// Cheap to construct: the underlying `reqwest::Client` (and its connection
/// pool) is shared through [`SplunkBackend`].
#[derive(Debug, Clone)]
pub struct SplunkClient {
    http: reqwest::Client,
    base_url: Url,
    token: String,
}

impl SplunkClient {
    /// Bind `http` to `endpoint`. Hosts without a scheme default to `https`.
    pub fn new(http: reqwest::Client, endpoint: &SearchEndpoint) -> Result<Self, SearchError> {
        Ok(Self {
            http,
            base_url: parse_base_url(&endpoint.host)?,
            token: endpoint.token.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/services/search/jobs[/{segments}...]`, segments percent-encoded.
    fn jobs_url(&self, segments: &[&str]) -> Result<Url, SearchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SearchError::InvalidEndpoint(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["services", "search", "jobs"])
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl SearchJobClient for SplunkClient {
    async fn submit(&self, query: &str, window: &TimeWindow) -> Result<JobHandle, SearchError> {
        let url = self.jobs_url(&[])?;
        let search = normalize_search(query);
        let earliest = window.start.timestamp().to_string();
        let latest = window.end.timestamp().to_string();

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .form(&[
                ("search", search.as_str()),
                ("earliest_time", earliest.as_str()),
                ("latest_time", latest.as_str()),
                ("output_mode", "json"),
            ])
            .send()
            .await
            .map_err(|e| SearchError::Submission(e.to_string()))?;

        let body = read_success(response)
            .await
            .map_err(SearchError::Submission)?;
        let created: CreateJobResponse = serde_json::from_str(&body)
            .map_err(|e| SearchError::Submission(format!("unexpected response: {e}")))?;

        info!(sid = %created.sid, earliest = %earliest, latest = %latest, "Search job created");
        Ok(JobHandle::new(created.sid))
    }

    async fn status(&self, handle: &JobHandle) -> Result<JobStatus, SearchError> {
        let status_err = |reason: String| SearchError::Status {
            sid: handle.sid.clone(),
            reason,
        };

        let url = self.jobs_url(&[&handle.sid])?;
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .query(&[("output_mode", "json")])
            .send()
            .await
            .map_err(|e| status_err(e.to_string()))?;

        let body = read_success(response).await.map_err(status_err)?;
        let parsed: JobStatusResponse = serde_json::from_str(&body)
            .map_err(|e| status_err(format!("unexpected response: {e}")))?;
        let content = parsed
            .entry
            .into_iter()
            .next()
            .map(|e| e.content)
            .ok_or_else(|| status_err("no job entry in response".to_string()))?;

        let state = if content.is_failed {
            JobState::Failed
        } else {
            dispatch_state(&content.dispatch_state)
        };

        let message = (state == JobState::Failed).then(|| {
            let texts = message_texts(&content.messages);
            if texts.is_empty() {
                format!("dispatch state {}", content.dispatch_state)
            } else {
                texts.join("; ")
            }
        });

        Ok(JobStatus { state, message })
    }

    async fn fetch_results(&self, handle: &JobHandle) -> Result<Vec<ResultRow>, SearchError> {
        let fetch_err = |reason: String| SearchError::Fetch {
            sid: handle.sid.clone(),
            reason,
        };

        let url = self.jobs_url(&[&handle.sid, "results"])?;
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .query(&[("output_mode", "json"), ("count", "0")])
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;

        let body = read_success(response).await.map_err(fetch_err)?;
        let parsed: ResultsResponse = serde_json::from_str(&body)
            .map_err(|e| fetch_err(format!("unexpected response: {e}")))?;

        debug!(sid = %handle, rows = parsed.results.len(), "Fetched search results");
        Ok(parsed.results)
    }

    async fn cancel(&self, handle: &JobHandle) -> Result<(), SearchError> {
        info!(sid = %handle, "Cancelling search job");

        let url = self.jobs_url(&[&handle.sid, "control"])?;
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .form(&[("action", "cancel"), ("output_mode", "json")])
            .send()
            .await
            .map_err(|e| SearchError::Status {
                sid: handle.sid.clone(),
                reason: e.to_string(),
            })?;

        read_success(response)
            .await
            .map(|_| ())
            .map_err(|reason| SearchError::Status {
                sid: handle.sid.clone(),
                reason,
            })
    }
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// Shares one HTTP connection pool across every Splunk endpoint.
#[derive(Debug, Clone)]
pub struct SplunkBackend {
    http: reqwest::Client,
}

impl SplunkBackend {
    pub fn new(config: &SplunkConfig) -> Result<Self, SearchError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .danger_accept_invalid_certs(config.insecure_tls)
            .build()
            .map_err(|e| SearchError::Client(e.to_string()))?;
        Ok(Self { http })
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl SearchBackend for SplunkBackend {
    fn client_for(&self, endpoint: &SearchEndpoint) -> Result<Arc<dyn SearchJobClient>, SearchError> {
        Ok(Arc::new(SplunkClient::new(self.http.clone(), endpoint)?))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_base_url(host: &str) -> Result<Url, SearchError> {
    let trimmed = host.trim();
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let url = Url::parse(&candidate).map_err(|_| SearchError::InvalidEndpoint(host.to_string()))?;
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(SearchError::InvalidEndpoint(host.to_string()));
    }
    Ok(url)
}

/// The jobs endpoint expects SPL starting with a command; bare expressions
/// get the implicit `search` prepended.
fn normalize_search(query: &str) -> String {
    let trimmed = query.trim_start();
    let first = trimmed.split_whitespace().next().unwrap_or("");
    if first == "search" || trimmed.starts_with('|') {
        trimmed.to_string()
    } else {
        format!("search {trimmed}")
    }
}

fn dispatch_state(state: &str) -> JobState {
    match state.to_ascii_uppercase().as_str() {
        "QUEUED" | "PARSING" => JobState::Submitted,
        "DONE" => JobState::Completed,
        "FAILED" => JobState::Failed,
        // RUNNING | FINALIZING | PAUSED and anything newer
        _ => JobState::Running,
    }
}

/// Collect `text` fields from Splunk's `messages` payloads, which come as a
/// list of `{type, text}` objects or as a `{type: [text]}` map.
fn message_texts(messages: &Value) -> Vec<String> {
    match messages {
        Value::Array(items) => items
            .iter()
            .filter_map(|m| m.get("text").and_then(Value::as_str))
            .map(str::to_string)
            .collect(),
        Value::Object(map) => map
            .values()
            .flat_map(|v| match v {
                Value::Array(texts) => texts
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect::<Vec<_>>(),
                Value::String(s) => vec![s.clone()],
                _ => Vec::new(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Return the body of a 2xx response, or a reason built from Splunk's error
/// messages.
async fn read_success(response: reqwest::Response) -> Result<String, String> {
    let status = response.status();
    let body = response.text().await.map_err(|e| e.to_string())?;

    if status.is_success() {
        return Ok(body);
    }

    let detail = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("messages").map(message_texts))
        .filter(|texts| !texts.is_empty())
        .map(|texts| texts.join("; "))
        .unwrap_or(body);
    Err(format!("HTTP {status}: {detail}"))
}

// ---------------------------------------------------------------------------
// Tests: request shaping only, HTTP behaviour lives in tests/
// ---------------------------------------------------------------------------
