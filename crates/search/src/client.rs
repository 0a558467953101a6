//! Search backend capability.
//!
//! [`SearchJobClient`] models an asynchronous search backend: a query is
//! submitted as a job over a bounded time range, polled until it reaches a
//! terminal state, and its result rows are fetched. [`SearchBackend`] hands
//! out clients bound to a specific endpoint so per-project credentials can
//! share one connection pool.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sli_core::TimeWindow;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::result::ResultRow;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors that can occur while running a search job.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SearchError {
    /// The endpoint host could not be turned into a URL.
    #[error("invalid search endpoint '{0}'")]
    InvalidEndpoint(String),

    /// The shared HTTP client could not be constructed.
    #[error("failed to build search client: {0}")]
    Client(String),

    /// The backend rejected the job or could not be reached.
    #[error("failed to create search job: {0}")]
    Submission(String),

    /// A status poll failed at the transport level.
    #[error("failed to poll search job {sid}: {reason}")]
    Status { sid: String, reason: String },

    /// The job reached the failed state on the backend.
    #[error("search job {sid} failed: {reason}")]
    JobFailed { sid: String, reason: String },

    /// The job did not reach a terminal state in time.
    #[error("search job {sid} timed out after {seconds}s")]
    Timeout { sid: String, seconds: u64 },

    /// Result rows could not be retrieved.
    #[error("failed to get search results for job {sid}: {reason}")]
    Fetch { sid: String, reason: String },

    /// A result value was missing or not numeric.
    #[error("failed to parse {field}: {reason}")]
    Parse { field: String, reason: String },
}

impl SearchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, SearchError::Timeout { .. })
    }
}

// ---------------------------------------------------------------------------
// Job model
// ---------------------------------------------------------------------------

/// Opaque handle for a submitted job (the backend's search id).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle {
    pub sid: String,
}

impl JobHandle {
    pub fn new(sid: impl Into<String>) -> Self {
        Self { sid: sid.into() }
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sid)
    }
}

/// Lifecycle of a search job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Submitted,
    Running,
    Completed,
    Failed,
    TimedOut,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobState::Submitted | JobState::Running)
    }
}

/// One status observation, with the backend's explanation for failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatus {
    pub state: JobState,
    pub message: Option<String>,
}

impl JobStatus {
    pub fn new(state: JobState) -> Self {
        Self { state, message: None }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            state: JobState::Failed,
            message: Some(message.into()),
        }
    }
}

/// Host and token of a search deployment.
#[derive(Clone, PartialEq, Eq)]
pub struct SearchEndpoint {
    pub host: String,
    pub token: String,
}

impl SearchEndpoint {
    pub fn new(host: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            token: token.into(),
        }
    }
}

impl fmt::Debug for SearchEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchEndpoint")
            .field("host", &self.host)
            .field("token", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// Submit / poll / fetch against an asynchronous search backend.
///
/// Implementations must be safe to share across concurrent evaluations.
#[async_trait]
pub trait SearchJobClient: Send + Sync {
    /// Start a job for `query` bounded to `window`.
    async fn submit(&self, query: &str, window: &TimeWindow) -> Result<JobHandle, SearchError>;

    /// Observe the current state of a job.
    async fn status(&self, handle: &JobHandle) -> Result<JobStatus, SearchError>;

    /// Retrieve all result rows of a completed job.
    async fn fetch_results(&self, handle: &JobHandle) -> Result<Vec<ResultRow>, SearchError>;

    /// Ask the backend to stop a job. Best effort.
    async fn cancel(&self, _handle: &JobHandle) -> Result<(), SearchError> {
        Ok(())
    }

    /// Poll [`status`](Self::status) every `poll_interval` until the job
    /// completes, fails, or `timeout` elapses.
    ///
    /// A timed-out job is cancelled before [`SearchError::Timeout`] is
    /// returned.
    async fn await_completion(
        &self,
        handle: &JobHandle,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<JobState, SearchError> {
        let start = Instant::now();

        loop {
            let status = self.status(handle).await?;

            debug!(
                sid = %handle,
                state = ?status.state,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Polling search job"
            );

            match status.state {
                JobState::Completed => return Ok(JobState::Completed),
                JobState::Failed => {
                    return Err(SearchError::JobFailed {
                        sid: handle.sid.clone(),
                        reason: status.message.unwrap_or_else(|| "unknown".to_string()),
                    });
                }
                JobState::TimedOut => break,
                JobState::Submitted | JobState::Running => {}
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                break;
            }

            // Never sleep past the timeout.
            tokio::time::sleep(poll_interval.min(timeout - elapsed)).await;
        }

        warn!(
            sid = %handle,
            timeout_seconds = timeout.as_secs(),
            "Search job timed out, cancelling"
        );
        // Best-effort cancel; the timeout is what gets reported.
        let _ = self.cancel(handle).await;
        Err(SearchError::Timeout {
            sid: handle.sid.clone(),
            seconds: timeout.as_secs(),
        })
    }
}

/// Hands out [`SearchJobClient`]s bound to an endpoint.
pub trait SearchBackend: Send + Sync {
    fn client_for(&self, endpoint: &SearchEndpoint) -> Result<Arc<dyn SearchJobClient>, SearchError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
