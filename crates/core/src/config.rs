use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.as_str(), "true" | "1"),
        None => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

/// Process-wide settings, built once at startup and passed by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub splunk: SplunkConfig,
    pub resources: ResourceConfig,
    pub evaluation: EvaluationConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `SLI_PROFILE`. When set (e.g. `PROD`), every key
    /// is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_opt("SLI_PROFILE").unwrap_or_default().to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            splunk: SplunkConfig::from_env_profiled(p),
            resources: ResourceConfig::from_env_profiled(p),
            evaluation: EvaluationConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  splunk:      endpoint={}, token={}, insecure_tls={}",
            self.splunk.endpoint,
            if self.splunk.token.is_some() { "(set)" } else { "(none)" },
            self.splunk.insecure_tls
        );
        tracing::info!(
            "  polling:     interval={}ms, job_timeout={}s",
            self.splunk.poll_interval_ms,
            self.splunk.job_timeout_seconds
        );
        tracing::info!(
            "  resources:   dir={}, uri={}, secrets={}",
            self.resources.resource_dir.display(),
            self.resources.resource_uri,
            self.resources.secrets_dir.display()
        );
        tracing::info!(
            "  evaluation:  deadline={}s, concurrency={}",
            self.evaluation.deadline_seconds,
            self.evaluation.concurrency
        );
    }
}

// ── Splunk ────────────────────────────────────────────────────

/// Default search endpoint used when a project has no credentials of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplunkConfig {
    pub endpoint: String,
    #[serde(skip_serializing)]
    pub token: Option<String>,
    /// Accept self-signed certificates on the management port.
    pub insecure_tls: bool,
    pub poll_interval_ms: u64,
    pub job_timeout_seconds: u64,
    pub request_timeout_seconds: u64,
}

impl SplunkConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            endpoint: profiled_env_or(p, "SPLUNK_ENDPOINT", "https://localhost:8089"),
            token: profiled_env_opt(p, "SPLUNK_TOKEN"),
            insecure_tls: profiled_env_bool(p, "SPLUNK_INSECURE_TLS", false),
            poll_interval_ms: profiled_env_u64(p, "SPLUNK_POLL_INTERVAL_MS", 1000),
            job_timeout_seconds: profiled_env_u64(p, "SPLUNK_JOB_TIMEOUT_SECONDS", 300),
            request_timeout_seconds: profiled_env_u64(p, "SPLUNK_REQUEST_TIMEOUT_SECONDS", 30),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

// ── Resource / secret locations ───────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Root of the layered SLI configuration documents.
    pub resource_dir: PathBuf,
    /// Document path below each scope directory.
    pub resource_uri: String,
    /// Directory holding mounted `splunk-credentials-<project>` secrets.
    pub secrets_dir: PathBuf,
}

impl ResourceConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            resource_dir: PathBuf::from(profiled_env_or(p, "SLI_RESOURCE_DIR", "resources")),
            resource_uri: profiled_env_or(p, "SLI_RESOURCE_URI", "splunk/sli.yaml"),
            secrets_dir: PathBuf::from(profiled_env_or(p, "SLI_SECRETS_DIR", "/var/run/secrets/sli")),
        }
    }
}

// ── Evaluation ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Overall bound on one evaluation; pending indicators time out past it.
    pub deadline_seconds: u64,
    /// Maximum indicators evaluated at once.
    pub concurrency: usize,
}

impl EvaluationConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            deadline_seconds: profiled_env_u64(p, "SLI_EVALUATION_DEADLINE_SECONDS", 600),
            concurrency: profiled_env_usize(p, "SLI_CONCURRENCY", 4).max(1),
        }
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_seconds)
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            deadline_seconds: 600,
            concurrency: 4,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
