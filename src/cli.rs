use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Verbosity levels for log output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Only show errors
    Quiet,
    /// Show warnings and errors
    #[default]
    Normal,
    /// Show schema resolution and cache activity
    Verbose,
}

impl VerbosityLevel {
    /// Default `tracing` filter directive for this level
    pub fn filter_directive(&self) -> &'static str {
        match self {
            VerbosityLevel::Quiet => "error",
            VerbosityLevel::Normal => "warn",
            VerbosityLevel::Verbose => "debug",
        }
    }
}

/// Report format used to render results
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One human-readable line per document
    #[default]
    Stdout,
    /// A JSON array printed once all documents are processed
    Json,
    /// Test Anything Protocol
    Tap,
}

/// Validate Kubernetes manifests against their JSON Schemas
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "validate-manifests")]
#[command(about = "Validate Kubernetes YAML manifests against the relevant JSON Schema")]
#[command(version)]
pub struct Cli {
    /// Manifest files to validate; reads stdin when empty or `-`
    pub files: Vec<PathBuf>,

    /// Directories to search recursively for manifests
    #[arg(short = 'd', long = "directories", value_delimiter = ',')]
    pub directories: Vec<PathBuf>,

    /// Version of Kubernetes to validate against
    #[arg(short = 'v', long = "kubernetes-version")]
    pub kubernetes_version: Option<String>,

    /// Base URL or directory used to download schemas
    #[arg(
        long = "schema-location",
        help = "Base URL used to download schemas. Can also be specified with the environment variable VALIDATE_MANIFESTS_SCHEMA_LOCATION"
    )]
    pub schema_location: Option<String>,

    /// Fallback schema locations tried in order after the primary one
    #[arg(long = "additional-schema-locations", value_delimiter = ',')]
    pub additional_schema_locations: Vec<String>,

    /// Use OpenShift schemas instead of upstream Kubernetes
    #[arg(long = "openshift")]
    pub openshift: bool,

    /// Disallow additional properties not in schema
    #[arg(long = "strict")]
    pub strict: bool,

    /// Skip validation for resource definitions without a schema
    #[arg(long = "ignore-missing-schemas")]
    pub ignore_missing_schemas: bool,

    /// Stop processing a batch when the first error is encountered
    #[arg(long = "exit-on-error")]
    pub exit_on_error: bool,

    /// Case-sensitive kinds to skip when validating against schemas
    #[arg(long = "skip-kinds", value_delimiter = ',')]
    pub skip_kinds: Vec<String>,

    /// Case-sensitive kinds to reject outright
    #[arg(long = "reject-kinds", value_delimiter = ',')]
    pub reject_kinds: Vec<String>,

    /// Namespace assumed for resources that do not declare one
    #[arg(long = "default-namespace")]
    pub default_namespace: Option<String>,

    /// Filename to be displayed when validating manifests read from stdin
    #[arg(short = 'f', long = "filename")]
    pub filename: Option<String>,

    /// Output format
    #[arg(short = 'o', long = "output", value_enum)]
    pub output: Option<OutputFormat>,

    /// Force colored output even if stdout is not a TTY
    #[arg(long = "force-color")]
    pub force_color: bool,

    /// Quiet mode (errors only)
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log schema resolution and cache activity
    #[arg(long = "verbose")]
    pub verbose: bool,

    /// Number of parallel workers
    #[arg(short = 'w', long = "workers")]
    pub workers: Option<usize>,

    /// Number of files handed to a worker at once
    #[arg(long = "batch-size")]
    pub batch_size: Option<usize>,

    /// Regular expressions of file paths to ignore
    #[arg(short = 'i', long = "ignored-filename-patterns", value_delimiter = ',')]
    pub ignored_filename_patterns: Vec<String>,

    /// Configuration file (TOML or JSON)
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Persist downloaded schemas in this directory across runs
    #[arg(long = "cache-dir")]
    pub cache_dir: Option<PathBuf>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn validate(&self) -> Result<(), String> {
        for path in self.files.iter().chain(&self.directories) {
            if path.as_os_str() != "-" && !path.exists() {
                return Err(format!("Path does not exist: {}", path.display()));
            }
        }
        if let Some(workers) = self.workers
            && workers == 0
        {
            return Err("Number of workers must be greater than 0".to_string());
        }
        Ok(())
    }

    /// True when input should come from stdin instead of files
    pub fn wants_stdin(&self) -> bool {
        let only_dash = self.files.len() == 1 && self.files[0].as_os_str() == "-";
        only_dash || (self.files.is_empty() && self.directories.is_empty())
    }
}
