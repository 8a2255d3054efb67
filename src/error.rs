use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Main library error type covering every failure mode of a validation run
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not read {path}: {source}")]
    ReadSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status error: {status} for {url} - {message}")]
    HttpStatus {
        url: String,
        status: u16,
        message: String,
    },

    #[error("Request timeout: {url} after {timeout_seconds} seconds")]
    Timeout { url: String, timeout_seconds: u64 },

    #[error("Schema parsing error: {reference} - {details}")]
    SchemaParsing { reference: String, details: String },

    #[error("Schema not found: {reference}")]
    SchemaNotFound { reference: String },

    #[error("Failed to decode YAML from {file}: {details}")]
    Decode { file: String, details: String },

    #[error("{file}: {details}")]
    MissingField {
        file: String,
        field: String,
        details: String,
    },

    #[error("{file}: no schema available for {kind} ({api_version}):\n{attempts}")]
    SchemaUnavailable {
        file: String,
        kind: String,
        api_version: String,
        attempts: FetchAttempts,
    },

    #[error("{file}: prohibited resource kind '{kind}'")]
    ProhibitedKind { file: String, kind: String },

    #[error("{file}: duplicate '{kind}' resource '{name}' in namespace '{namespace}'")]
    DuplicateResource {
        file: String,
        api_version: String,
        kind: String,
        namespace: String,
        name: String,
    },

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Output error: {0}")]
    Output(String),

    #[error("Concurrent operation error: {details}")]
    Concurrency { details: String },
}

/// Taxonomy of failures a run can report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed document syntax
    Decode,
    /// Absent or mistyped kind/apiVersion
    MissingField,
    /// Every schema location exhausted
    SchemaUnavailable,
    /// Kind listed in the reject set
    ProhibitedKind,
    /// Same (apiVersion, kind, namespace, name) seen twice
    DuplicateResource,
    /// Source could not be read
    Io,
    /// Transport, cache, config and other infrastructure failures
    Internal,
}

impl ValidationError {
    /// Classify this error against the run's error taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::Decode { .. } => ErrorKind::Decode,
            ValidationError::MissingField { .. } => ErrorKind::MissingField,
            ValidationError::SchemaUnavailable { .. } => ErrorKind::SchemaUnavailable,
            ValidationError::ProhibitedKind { .. } => ErrorKind::ProhibitedKind,
            ValidationError::DuplicateResource { .. } => ErrorKind::DuplicateResource,
            ValidationError::Io(_) | ValidationError::ReadSource { .. } => ErrorKind::Io,
            _ => ErrorKind::Internal,
        }
    }

    /// Whether this error stops the current batch when exit-on-error is set.
    /// Duplicates are reported but never short-circuit a batch.
    pub fn halts_batch(&self) -> bool {
        self.kind() != ErrorKind::DuplicateResource
    }
}

/// One failed attempt at loading a schema from a single location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub reference: String,
    pub reason: String,
}

/// Every location tried for one schema identity, in the order tried
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchAttempts(pub Vec<FetchFailure>);

impl FetchAttempts {
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|f| f.reference.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FetchAttempts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  {}: {}", failure.reference, failure.reason)?;
        }
        Ok(())
    }
}

/// Aggregated fatal errors collected over a run
#[derive(Debug, Default)]
pub struct MultiError {
    errors: Vec<ValidationError>,
}

impl MultiError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn extend(&mut self, errors: impl IntoIterator<Item = ValidationError>) {
        self.errors.extend(errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn into_inner(self) -> Vec<ValidationError> {
        self.errors
    }

    /// `Ok(())` when nothing was collected, mirroring an optional aggregate
    pub fn into_result(self) -> std::result::Result<(), MultiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.len() {
            0 => write!(f, "no errors"),
            1 => write!(f, "1 error occurred:\n\t* {}", self.errors[0]),
            n => {
                write!(f, "{} errors occurred:", n)?;
                for error in &self.errors {
                    write!(f, "\n\t* {}", error)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for MultiError {}

impl From<Vec<ValidationError>> for MultiError {
    fn from(errors: Vec<ValidationError>) -> Self {
        Self { errors }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ValidationError>;
