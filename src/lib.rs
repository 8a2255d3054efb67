//! # validate-manifests Library
//!
//! Validates Kubernetes manifests against the JSON Schema for their kind and
//! apiVersion. Schemas are downloaded once per run and shared by every worker.

pub mod cache;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod file_discovery;
pub mod http_client;
pub mod locator;
pub mod output;
pub mod resource;
pub mod schema_loader;
pub mod splitter;
pub mod validator;

pub use cache::{CacheEntry, CacheStats, DiskCache, SchemaCache, SchemaIdentity};
pub use cli::{Cli, OutputFormat, VerbosityLevel};
pub use config::{Config, ConfigManager};
pub use duplicates::DuplicateDetector;
pub use error::{ErrorKind, MultiError, ValidationError};
pub use file_discovery::FileDiscovery;
pub use http_client::{AsyncHttpClient, HttpClientConfig};
pub use output::{JsonReporter, Reporter, StdoutReporter, TapReporter, reporter_for};
pub use resource::{ResourceValidator, ResultStatus, SchemaViolation, ValidationResult};
pub use schema_loader::{CompiledSchema, ReferenceFetcher, SchemaFetcher, SchemaLoader};
pub use splitter::{Document, split};
pub use validator::{BatchOutput, RunSummary, ValidationEngine};
