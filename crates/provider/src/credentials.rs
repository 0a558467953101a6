//! Per-project search backend credentials.
//!
//! A project may point at its own Splunk deployment through a secret named
//! `splunk-credentials-<project>`. When no such secret exists the process-wide
//! default endpoint is used; credential problems never abort an evaluation.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use sli_core::config::SplunkConfig;
use sli_search::SearchEndpoint;
use tracing::{info, warn};

use crate::store::is_path_segment;

/// Secret key holding the host.
pub const HOST_KEY: &str = "SPLUNK_HOST";
/// Secret key holding the token.
pub const TOKEN_KEY: &str = "SPLUNK_TOKEN";
/// Deprecated single-key YAML form: `{host, token}`.
pub const LEGACY_KEY: &str = "splunk-credentials";

pub fn secret_name(project: &str) -> String {
    format!("splunk-credentials-{project}")
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("failed to read secret {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("invalid credentials format found in secret '{secret}': {reason}")]
    InvalidFormat { secret: String, reason: String },

    #[error("project '{0}' cannot name a credentials secret")]
    InvalidProject(String),
}

/// Outcome of a credential lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialLookup {
    Found(SearchEndpoint),
    NotConfigured,
    Error(CredentialError),
}

impl CredentialLookup {
    /// Endpoint to use for `project`, falling back to `default` unless
    /// credentials were found.
    pub fn into_endpoint(self, project: &str, default: &SearchEndpoint) -> SearchEndpoint {
        match self {
            CredentialLookup::Found(endpoint) => {
                info!(project, host = %endpoint.host, "Using project-specific search endpoint");
                endpoint
            }
            CredentialLookup::NotConfigured => {
                info!(project, host = %default.host, "No credentials for project, using default endpoint");
                default.clone()
            }
            CredentialLookup::Error(e) => {
                warn!(project, error = %e, host = %default.host, "Failed to load credentials, using default endpoint");
                default.clone()
            }
        }
    }
}

/// Supplies per-project search endpoints.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn lookup(&self, project: &str) -> CredentialLookup;
}

/// Process-wide default endpoint from configuration.
pub fn default_endpoint(config: &SplunkConfig) -> SearchEndpoint {
    SearchEndpoint::new(config.endpoint.clone(), config.token.clone().unwrap_or_default())
}

// ── Mounted secrets ─────────────────────────────────────────────────

/// Reads secrets mounted as directories, one file per key:
///
/// ```text
/// {dir}/splunk-credentials-{project}/SPLUNK_HOST
/// {dir}/splunk-credentials-{project}/SPLUNK_TOKEN
/// {dir}/splunk-credentials-{project}/splunk-credentials   (legacy)
/// ```
#[derive(Debug, Clone)]
pub struct SecretDirCredentials {
    dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct LegacyCredentials {
    #[serde(default)]
    host: String,
    #[serde(default)]
    token: String,
}

impl SecretDirCredentials {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory of the secret for `project`, kept inside the secrets dir.
    pub fn secret_dir(&self, project: &str) -> Result<PathBuf, CredentialError> {
        let name = secret_name(project);
        if !is_path_segment(&name) {
            return Err(CredentialError::InvalidProject(project.to_string()));
        }
        Ok(self.dir.join(name))
    }

    async fn legacy(&self, secret_dir: &Path, project: &str) -> CredentialLookup {
        let secret = secret_name(project);
        let raw = match read_key(secret_dir, LEGACY_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                return CredentialLookup::Error(CredentialError::InvalidFormat {
                    secret,
                    reason: format!("neither {HOST_KEY}/{TOKEN_KEY} nor {LEGACY_KEY} present"),
                })
            }
            Err(e) => return CredentialLookup::Error(e),
        };

        match serde_yaml::from_str::<LegacyCredentials>(&raw) {
            Ok(creds) => {
                warn!(
                    project,
                    secret = %secret,
                    "Deprecated credentials format, migrate to {HOST_KEY} and {TOKEN_KEY} keys"
                );
                CredentialLookup::Found(SearchEndpoint::new(strip_spaces(&creds.host), creds.token))
            }
            Err(e) => CredentialLookup::Error(CredentialError::InvalidFormat {
                secret,
                reason: e.to_string(),
            }),
        }
    }
}

#[async_trait]
impl CredentialProvider for SecretDirCredentials {
    async fn lookup(&self, project: &str) -> CredentialLookup {
        let secret_dir = match self.secret_dir(project) {
            Ok(dir) => dir,
            Err(e) => return CredentialLookup::Error(e),
        };

        match tokio::fs::metadata(&secret_dir).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return CredentialLookup::NotConfigured,
            Err(e) if e.kind() == ErrorKind::NotFound => return CredentialLookup::NotConfigured,
            Err(e) => {
                return CredentialLookup::Error(CredentialError::Io {
                    path: secret_dir.display().to_string(),
                    reason: e.to_string(),
                })
            }
        }

        let host = read_key(&secret_dir, HOST_KEY).await;
        let token = read_key(&secret_dir, TOKEN_KEY).await;

        match (host, token) {
            (Ok(Some(host)), Ok(Some(token))) => {
                CredentialLookup::Found(SearchEndpoint::new(strip_spaces(&host), token.trim()))
            }
            _ => self.legacy(&secret_dir, project).await,
        }
    }
}

/// Contents of `{dir}/{key}`, or `None` if the key is absent.
async fn read_key(dir: &Path, key: &str) -> Result<Option<String>, CredentialError> {
    let path = dir.join(key);
    match tokio::fs::read_to_string(&path).await {
        Ok(raw) => Ok(Some(raw)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CredentialError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Hosts are pasted into secrets by hand; stray spaces and the trailing
/// newline are never meaningful.
fn strip_spaces(host: &str) -> String {
    host.trim().replace(' ', "")
}

// ── In-memory ───────────────────────────────────────────────────────

/// Fixed lookups per project; unknown projects are not configured.
#[derive(Debug, Default, Clone)]
pub struct MemoryCredentials {
    projects: HashMap<String, CredentialLookup>,
}

impl MemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint(mut self, project: impl Into<String>, endpoint: SearchEndpoint) -> Self {
        self.projects
            .insert(project.into(), CredentialLookup::Found(endpoint));
        self
    }

    pub fn with_error(mut self, project: impl Into<String>, error: CredentialError) -> Self {
        self.projects
            .insert(project.into(), CredentialLookup::Error(error));
        self
    }
}

#[async_trait]
impl CredentialProvider for MemoryCredentials {
    async fn lookup(&self, project: &str) -> CredentialLookup {
        self.projects
            .get(project)
            .cloned()
            .unwrap_or(CredentialLookup::NotConfigured)
    }
}
