//! Scripted in-memory search backend.
//!
//! Responses are keyed by a substring of the submitted query: the first
//! script whose pattern occurs in the query decides how the job behaves.
//! Every submitted query is recorded so callers can assert on the rendered
//! text.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sli_core::TimeWindow;

use crate::client::{
    JobHandle, JobState, JobStatus, SearchBackend, SearchEndpoint, SearchError, SearchJobClient,
};
use crate::result::ResultRow;

/// How a scripted job behaves once submitted.
#[derive(Debug, Clone)]
enum Behavior {
    /// Runs for `running_polls` polls, then completes with `rows`.
    Rows { rows: Vec<ResultRow>, running_polls: u32 },
    /// Submission is rejected with this reason.
    RejectSubmission(String),
    /// The job ends in the failed state with this reason.
    Fail(String),
    /// The job never leaves the running state.
    Stuck,
    /// Completes, but fetching results fails with this reason.
    FetchError(String),
}

#[derive(Debug)]
struct Job {
    behavior: Behavior,
    polls: u32,
}

/// A fake [`SearchJobClient`] driven by query-substring scripts.
#[derive(Debug, Default)]
pub struct MemorySearchClient {
    scripts: Vec<(String, Behavior)>,
    jobs: Mutex<HashMap<String, Job>>,
    submitted: Mutex<Vec<String>>,
    cancelled: Mutex<Vec<String>>,
    next_sid: AtomicU64,
}

impl MemorySearchClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queries containing `pattern` complete immediately with `rows`.
    pub fn with_rows(self, pattern: impl Into<String>, rows: Vec<ResultRow>) -> Self {
        self.with_slow_rows(pattern, rows, 0)
    }

    /// Queries containing `pattern` report running for `running_polls`
    /// polls before completing with `rows`.
    pub fn with_slow_rows(mut self, pattern: impl Into<String>, rows: Vec<ResultRow>, running_polls: u32) -> Self {
        self.scripts
            .push((pattern.into(), Behavior::Rows { rows, running_polls }));
        self
    }

    pub fn rejecting(mut self, pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        self.scripts
            .push((pattern.into(), Behavior::RejectSubmission(reason.into())));
        self
    }

    pub fn failing(mut self, pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        self.scripts.push((pattern.into(), Behavior::Fail(reason.into())));
        self
    }

    pub fn stuck(mut self, pattern: impl Into<String>) -> Self {
        self.scripts.push((pattern.into(), Behavior::Stuck));
        self
    }

    pub fn failing_fetch(mut self, pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        self.scripts
            .push((pattern.into(), Behavior::FetchError(reason.into())));
        self
    }

    /// Queries submitted so far, in submission order.
    pub fn submitted(&self) -> Vec<String> {
        lock(&self.submitted).clone()
    }

    /// Search ids cancelled so far.
    pub fn cancelled(&self) -> Vec<String> {
        lock(&self.cancelled).clone()
    }

    fn behavior_for(&self, query: &str) -> Option<Behavior> {
        self.scripts
            .iter()
            .find(|(pattern, _)| query.contains(pattern.as_str()))
            .map(|(_, behavior)| behavior.clone())
    }

    fn with_job<T>(
        &self,
        handle: &JobHandle,
        f: impl FnOnce(&mut Job) -> Result<T, SearchError>,
    ) -> Result<T, SearchError> {
        let mut jobs = lock(&self.jobs);
        let job = jobs.get_mut(&handle.sid).ok_or_else(|| SearchError::Status {
            sid: handle.sid.clone(),
            reason: "unknown search id".to_string(),
        })?;
        f(job)
    }
}

#[async_trait]
impl SearchJobClient for MemorySearchClient {
    async fn submit(&self, query: &str, _window: &TimeWindow) -> Result<JobHandle, SearchError> {
        lock(&self.submitted).push(query.to_string());

        let behavior = self
            .behavior_for(query)
            .ok_or_else(|| SearchError::Submission(format!("no scripted response for query '{query}'")))?;
        if let Behavior::RejectSubmission(reason) = &behavior {
            return Err(SearchError::Submission(reason.clone()));
        }

        let sid = format!("mem-{}", self.next_sid.fetch_add(1, Ordering::SeqCst) + 1);
        lock(&self.jobs).insert(sid.clone(), Job { behavior, polls: 0 });
        Ok(JobHandle::new(sid))
    }

    async fn status(&self, handle: &JobHandle) -> Result<JobStatus, SearchError> {
        self.with_job(handle, |job| {
            job.polls += 1;
            let status = match &job.behavior {
                Behavior::Rows { running_polls, .. } if job.polls <= *running_polls => {
                    JobStatus::new(JobState::Running)
                }
                Behavior::Rows { .. } | Behavior::FetchError(_) => JobStatus::new(JobState::Completed),
                Behavior::Fail(reason) => JobStatus::failed(reason.clone()),
                Behavior::Stuck => JobStatus::new(JobState::Running),
                Behavior::RejectSubmission(_) => JobStatus::new(JobState::Failed),
            };
            Ok(status)
        })
    }

    async fn fetch_results(&self, handle: &JobHandle) -> Result<Vec<ResultRow>, SearchError> {
        self.with_job(handle, |job| match &job.behavior {
            Behavior::Rows { rows, .. } => Ok(rows.clone()),
            Behavior::FetchError(reason) => Err(SearchError::Fetch {
                sid: handle.sid.clone(),
                reason: reason.clone(),
            }),
            _ => Err(SearchError::Fetch {
                sid: handle.sid.clone(),
                reason: "job has no results".to_string(),
            }),
        })
    }

    async fn cancel(&self, handle: &JobHandle) -> Result<(), SearchError> {
        lock(&self.cancelled).push(handle.sid.clone());
        Ok(())
    }
}

/// [`SearchBackend`] that hands out the same scripted client for every
/// endpoint and records which endpoints were requested.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    client: Arc<MemorySearchClient>,
    endpoints: Mutex<Vec<SearchEndpoint>>,
}

impl MemoryBackend {
    pub fn new(client: Arc<MemorySearchClient>) -> Self {
        Self {
            client,
            endpoints: Mutex::new(Vec::new()),
        }
    }

    pub fn client(&self) -> &Arc<MemorySearchClient> {
        &self.client
    }

    /// Endpoints requested so far.
    pub fn endpoints(&self) -> Vec<SearchEndpoint> {
        lock(&self.endpoints).clone()
    }
}

impl SearchBackend for MemoryBackend {
    fn client_for(&self, endpoint: &SearchEndpoint) -> Result<Arc<dyn SearchJobClient>, SearchError> {
        lock(&self.endpoints).push(endpoint.clone());
        Ok(self.client.clone())
    }
}

/// Lock ignoring poison: a panicked test thread must not cascade.
fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
