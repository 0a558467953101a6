//! SLI retrieval pipeline.
//!
//! This crate provides:
//! - Layered SLI query configuration (`store`, `resolver`)
//! - Query template rendering (`templater`)
//! - Per-project search credentials with default fallback (`credentials`)
//! - Concurrent per-indicator evaluation and verdict aggregation
//!   (`evaluator`, `aggregate`)
//! - The request → report pipeline (`handler`)

pub mod aggregate;
pub mod credentials;
pub mod evaluator;
pub mod handler;
pub mod resolver;
pub mod store;
pub mod templater;

pub use aggregate::aggregate;
pub use credentials::{CredentialError, CredentialLookup, CredentialProvider, MemoryCredentials, SecretDirCredentials};
pub use evaluator::{EvaluatorSettings, IndicatorError, IndicatorEvaluator};
pub use handler::{GetSliHandler, HandlerError};
pub use resolver::{ConfigError, ConfigResolver, EffectiveConfig};
pub use store::{FsResourceStore, MemoryResourceStore, ResourceStore, Scope, StoreError};
pub use templater::{render, TemplateError};
