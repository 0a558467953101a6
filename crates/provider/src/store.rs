//! Resource store holding raw SLI configuration documents.
//!
//! Documents live at three scopes: project, project + stage, and
//! project + stage + service. A store must report a missing document as
//! [`StoreError::NotFound`] so the resolver can skip that scope.

use std::collections::HashMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

/// Errors produced by [`ResourceStore`] lookups.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No document exists at this scope.
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A scope identifier that cannot name a single directory.
    #[error("invalid {field} identifier '{value}'")]
    InvalidScope { field: &'static str, value: String },

    /// The store itself could not serve the request.
    #[error("resource store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// One configuration level.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Project {
        project: String,
    },
    Stage {
        project: String,
        stage: String,
    },
    Service {
        project: String,
        stage: String,
        service: String,
    },
}

impl Scope {
    pub fn project(project: impl Into<String>) -> Self {
        Scope::Project {
            project: project.into(),
        }
    }

    pub fn stage(project: impl Into<String>, stage: impl Into<String>) -> Self {
        Scope::Stage {
            project: project.into(),
            stage: stage.into(),
        }
    }

    pub fn service(project: impl Into<String>, stage: impl Into<String>, service: impl Into<String>) -> Self {
        Scope::Service {
            project: project.into(),
            stage: stage.into(),
            service: service.into(),
        }
    }

    /// Scopes to consult, least specific first. A scope is included only
    /// when all of its identifying fields are non-empty.
    pub fn chain(project: &str, stage: &str, service: &str) -> Vec<Scope> {
        let mut scopes = Vec::with_capacity(3);
        if project.is_empty() {
            return scopes;
        }
        scopes.push(Scope::project(project));
        if !stage.is_empty() {
            scopes.push(Scope::stage(project, stage));
            if !service.is_empty() {
                scopes.push(Scope::service(project, stage, service));
            }
        }
        scopes
    }
}

/// True when `value` names exactly one entry inside a directory: not empty,
/// not `.` or `..`, not absolute, and free of path separators.
pub fn is_path_segment(value: &str) -> bool {
    if value.contains(['/', '\\', '\0']) {
        return false;
    }
    let mut components = Path::new(value).components();
    matches!((components.next(), components.next()), (Some(Component::Normal(_)), None))
}

fn segment<'a>(field: &'static str, value: &'a str) -> Result<&'a str, StoreError> {
    if is_path_segment(value) {
        Ok(value)
    } else {
        Err(StoreError::InvalidScope {
            field,
            value: value.to_string(),
        })
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Project { project } => write!(f, "project '{project}'"),
            Scope::Stage { project, stage } => write!(f, "project '{project}' stage '{stage}'"),
            Scope::Service {
                project,
                stage,
                service,
            } => write!(f, "project '{project}' stage '{stage}' service '{service}'"),
        }
    }
}

/// Source of raw configuration documents.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn get_document(&self, scope: &Scope) -> Result<String, StoreError>;
}

// ── Filesystem store ────────────────────────────────────────────────

/// Reads documents from a directory tree.
///
/// ```text
/// {root}/{project}/{uri}
/// {root}/{project}/stages/{stage}/{uri}
/// {root}/{project}/stages/{stage}/services/{service}/{uri}
/// ```
#[derive(Debug, Clone)]
pub struct FsResourceStore {
    root: PathBuf,
    uri: String,
}

impl FsResourceStore {
    pub fn new(root: impl Into<PathBuf>, uri: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            uri: uri.into(),
        }
    }

    /// Path of the document for `scope`. Identifiers come from requests, so
    /// each must be a single path segment below the root.
    pub fn document_path(&self, scope: &Scope) -> Result<PathBuf, StoreError> {
        let dir = match scope {
            Scope::Project { project } => self.root.join(segment("project", project)?),
            Scope::Stage { project, stage } => self
                .root
                .join(segment("project", project)?)
                .join("stages")
                .join(segment("stage", stage)?),
            Scope::Service {
                project,
                stage,
                service,
            } => self
                .root
                .join(segment("project", project)?)
                .join("stages")
                .join(segment("stage", stage)?)
                .join("services")
                .join(segment("service", service)?),
        };
        Ok(dir.join(Path::new(&self.uri)))
    }
}

#[async_trait]
impl ResourceStore for FsResourceStore {
    async fn get_document(&self, scope: &Scope) -> Result<String, StoreError> {
        let path = self.document_path(scope)?;
        debug!(path = %path.display(), %scope, "Reading SLI document");

        tokio::fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StoreError::NotFound(path.display().to_string())
            } else {
                StoreError::Io {
                    path: path.display().to_string(),
                    source: e,
                }
            }
        })
    }
}

// ── In-memory store ─────────────────────────────────────────────────

/// Documents held in memory, keyed by scope.
#[derive(Debug, Default, Clone)]
pub struct MemoryResourceStore {
    documents: HashMap<Scope, Result<String, String>>,
}

impl MemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, scope: Scope, document: impl Into<String>) -> Self {
        self.documents.insert(scope, Ok(document.into()));
        self
    }

    /// Lookups for `scope` fail with [`StoreError::Unavailable`].
    pub fn with_failure(mut self, scope: Scope, reason: impl Into<String>) -> Self {
        self.documents.insert(scope, Err(reason.into()));
        self
    }
}

#[async_trait]
impl ResourceStore for MemoryResourceStore {
    async fn get_document(&self, scope: &Scope) -> Result<String, StoreError> {
        match self.documents.get(scope) {
            Some(Ok(doc)) => Ok(doc.clone()),
            Some(Err(reason)) => Err(StoreError::Unavailable(reason.clone())),
            None => Err(StoreError::NotFound(scope.to_string())),
        }
    }
}
