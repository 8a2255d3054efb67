use crate::cli::{Cli, OutputFormat, VerbosityLevel};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Registry holding the upstream Kubernetes standalone schemas
pub const DEFAULT_SCHEMA_LOCATION: &str = "https://kubernetesjsonschema.dev";

/// Registry holding the OpenShift standalone schemas
pub const OPENSHIFT_SCHEMA_LOCATION: &str =
    "https://raw.githubusercontent.com/garethr/openshift-json-schema/master";

/// Version sentinel used verbatim as a registry directory name
pub const MASTER_VERSION: &str = "master";

const ENV_PREFIX: &str = "VALIDATE_MANIFESTS_";

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Settings for one validation run, shared read-only by every worker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub schema: SchemaConfig,
    pub validation: ValidationConfig,
    pub network: NetworkConfig,
    pub cache: CacheConfig,
    pub output: OutputConfig,
    pub files: FileConfig,
}

/// Where schemas live and which flavour of them to use
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchemaConfig {
    /// Kubernetes version whose schemas are used
    pub kubernetes_version: String,
    /// Use the strict schema set that rejects unknown properties
    pub strict: bool,
    /// Explicit base location, highest precedence
    pub schema_location: Option<String>,
    /// Base location taken from the environment
    #[serde(skip)]
    pub env_schema_location: Option<String>,
    /// Use the OpenShift registry and its un-suffixed file names
    pub openshift: bool,
    /// Fallback base locations tried in order
    pub additional_schema_locations: Vec<String>,
    /// Treat unresolvable schemas as non-fatal
    pub ignore_missing_schemas: bool,
}

/// Per-document policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidationConfig {
    /// Kinds never checked against a schema
    pub kinds_to_skip: BTreeSet<String>,
    /// Kinds that always fail
    pub kinds_to_reject: BTreeSet<String>,
    /// Namespace assumed for resources that omit one
    pub default_namespace: String,
    /// Stop the current batch at the first fatal error
    pub exit_on_error: bool,
    /// Provenance name for input that has no path of its own
    pub file_name: String,
    /// Number of parallel workers
    pub workers: Option<usize>,
    /// Files per work item
    pub batch_size: usize,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// HTTP request timeout in seconds
    pub timeout_seconds: u64,
    /// Number of retry attempts for failed downloads
    pub retry_attempts: u32,
    /// Retry delay in milliseconds
    pub retry_delay_ms: u64,
}

/// Persistent schema store configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Persist downloaded schemas across runs
    pub enabled: bool,
    /// Cache directory path
    pub directory: PathBuf,
    /// Time-to-live for cached schemas in hours
    pub ttl_hours: u64,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub quiet: bool,
    pub verbose: bool,
    pub force_color: bool,
}

/// File discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    /// File extensions picked up when walking directories
    pub extensions: Vec<String>,
    /// Regular expressions of paths to leave out
    pub ignored_path_patterns: Vec<String>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            kubernetes_version: MASTER_VERSION.to_string(),
            strict: false,
            schema_location: None,
            env_schema_location: None,
            openshift: false,
            additional_schema_locations: Vec::new(),
            ignore_missing_schemas: false,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            kinds_to_skip: BTreeSet::new(),
            kinds_to_reject: BTreeSet::new(),
            default_namespace: "default".to_string(),
            exit_on_error: false,
            file_name: "stdin".to_string(),
            workers: None,
            batch_size: 100,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            retry_attempts: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("validate-manifests"),
            ttl_hours: 24,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["yaml".to_string(), "yml".to_string(), "json".to_string()],
            ignored_path_patterns: vec![],
        }
    }
}

impl OutputConfig {
    pub fn verbosity(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }
}

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: file -> environment -> CLI
    pub async fn load_config(cli: &Cli) -> Result<Config> {
        let mut config = if let Some(config_path) = &cli.config {
            Self::load_from_file(config_path).await?
        } else {
            Self::find_config_file().await?.unwrap_or_default()
        };

        config = Self::apply_environment_overrides(config)?;
        config = Self::merge_with_cli(config, cli);

        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON); missing keys keep defaults
    pub async fn load_from_file(path: &Path) -> Result<Config> {
        let content = tokio::fs::read_to_string(path).await?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => {
                if let Ok(config) = toml::from_str::<Config>(&content) {
                    Ok(config)
                } else {
                    Ok(serde_json::from_str(&content)?)
                }
            }
        }
    }

    /// Find configuration file in standard locations
    pub async fn find_config_file() -> Result<Option<Config>> {
        let config_names = [
            "validate-manifests.toml",
            "validate-manifests.json",
            ".validate-manifests.toml",
            ".validate-manifests.json",
        ];

        for name in &config_names {
            let path = PathBuf::from(name);
            if path.exists() {
                return Ok(Some(Self::load_from_file(&path).await?));
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let app_config_dir = config_dir.join("validate-manifests");
            for name in &config_names {
                let path = app_config_dir.join(name);
                if path.exists() {
                    return Ok(Some(Self::load_from_file(&path).await?));
                }
            }
        }

        Ok(None)
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: Config) -> Result<Config> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        // Schema settings
        if let Some(location) = env_string(env, "SCHEMA_LOCATION") {
            config.schema.env_schema_location = Some(location);
        }
        if let Some(version) = env_string(env, "KUBERNETES_VERSION") {
            config.schema.kubernetes_version = version;
        }
        if let Some(strict) = env_parse(env, "STRICT")? {
            config.schema.strict = strict;
        }
        if let Some(openshift) = env_parse(env, "OPENSHIFT")? {
            config.schema.openshift = openshift;
        }
        if let Some(ignore) = env_parse(env, "IGNORE_MISSING_SCHEMAS")? {
            config.schema.ignore_missing_schemas = ignore;
        }
        if let Some(locations) = env_string(env, "ADDITIONAL_SCHEMA_LOCATIONS") {
            config.schema.additional_schema_locations = split_list(&locations);
        }

        // Validation settings
        if let Some(kinds) = env_string(env, "SKIP_KINDS") {
            config.validation.kinds_to_skip = split_list(&kinds).into_iter().collect();
        }
        if let Some(kinds) = env_string(env, "REJECT_KINDS") {
            config.validation.kinds_to_reject = split_list(&kinds).into_iter().collect();
        }
        if let Some(namespace) = env.get(&format!("{ENV_PREFIX}DEFAULT_NAMESPACE")) {
            config.validation.default_namespace = namespace;
        }
        if let Some(exit_on_error) = env_parse(env, "EXIT_ON_ERROR")? {
            config.validation.exit_on_error = exit_on_error;
        }
        if let Some(file_name) = env_string(env, "FILENAME") {
            config.validation.file_name = file_name;
        }
        if let Some(workers) = env_parse(env, "WORKERS")? {
            config.validation.workers = Some(workers);
        }

        // Network settings
        if let Some(timeout) = env_parse(env, "TIMEOUT")? {
            config.network.timeout_seconds = timeout;
        }
        if let Some(retry_attempts) = env_parse(env, "RETRY_ATTEMPTS")? {
            config.network.retry_attempts = retry_attempts;
        }

        // Cache settings
        if let Some(cache_dir) = env_string(env, "CACHE_DIR") {
            config.cache.directory = PathBuf::from(cache_dir);
            config.cache.enabled = true;
        }

        // Output settings
        if let Some(format) = env_string(env, "OUTPUT") {
            config.output.format = match format.to_lowercase().as_str() {
                "stdout" => OutputFormat::Stdout,
                "json" => OutputFormat::Json,
                "tap" => OutputFormat::Tap,
                _ => {
                    return Err(ConfigError::Environment(format!(
                        "Invalid {ENV_PREFIX}OUTPUT value: {}",
                        format
                    )));
                }
            };
        }

        Ok(config)
    }

    /// Merge CLI arguments with configuration (CLI takes precedence)
    pub fn merge_with_cli(mut config: Config, cli: &Cli) -> Config {
        // Schema settings
        if let Some(version) = &cli.kubernetes_version {
            config.schema.kubernetes_version = version.clone();
        }
        if let Some(location) = &cli.schema_location {
            config.schema.schema_location = Some(location.clone());
        }
        if !cli.additional_schema_locations.is_empty() {
            config.schema.additional_schema_locations = cli.additional_schema_locations.clone();
        }
        config.schema.strict |= cli.strict;
        config.schema.openshift |= cli.openshift;
        config.schema.ignore_missing_schemas |= cli.ignore_missing_schemas;

        // Validation settings
        if !cli.skip_kinds.is_empty() {
            config.validation.kinds_to_skip = cli.skip_kinds.iter().cloned().collect();
        }
        if !cli.reject_kinds.is_empty() {
            config.validation.kinds_to_reject = cli.reject_kinds.iter().cloned().collect();
        }
        if let Some(namespace) = &cli.default_namespace {
            config.validation.default_namespace = namespace.clone();
        }
        if let Some(file_name) = &cli.filename {
            config.validation.file_name = file_name.clone();
        }
        config.validation.exit_on_error |= cli.exit_on_error;
        if cli.workers.is_some() {
            config.validation.workers = cli.workers;
        }
        if let Some(batch_size) = cli.batch_size {
            config.validation.batch_size = batch_size;
        }

        // Cache settings
        if let Some(cache_dir) = &cli.cache_dir {
            config.cache.directory = cache_dir.clone();
            config.cache.enabled = true;
        }

        // Output settings
        if let Some(format) = cli.output {
            config.output.format = format;
        }
        config.output.quiet |= cli.quiet;
        config.output.verbose |= cli.verbose;
        config.output.force_color |= cli.force_color;

        // File settings
        if !cli.ignored_filename_patterns.is_empty() {
            config.files.ignored_path_patterns = cli.ignored_filename_patterns.clone();
        }

        config
    }

    /// Validate configuration values
    pub fn validate_config(config: &Config) -> Result<()> {
        if config.validation.default_namespace.is_empty() {
            return Err(ConfigError::Validation(
                "Default namespace must not be empty".to_string(),
            ));
        }

        if config.schema.kubernetes_version.is_empty() {
            return Err(ConfigError::Validation(
                "Kubernetes version must not be empty".to_string(),
            ));
        }

        if let Some(workers) = config.validation.workers {
            if workers == 0 {
                return Err(ConfigError::Validation(
                    "Number of workers must be greater than 0".to_string(),
                ));
            }
            if workers > 1000 {
                return Err(ConfigError::Validation(
                    "Number of workers cannot exceed 1000".to_string(),
                ));
            }
        }

        if config.validation.batch_size == 0 {
            return Err(ConfigError::Validation(
                "Batch size must be greater than 0".to_string(),
            ));
        }

        if config.network.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        if config.network.retry_attempts > 10 {
            return Err(ConfigError::Validation(
                "Retry attempts cannot exceed 10".to_string(),
            ));
        }

        if config.cache.enabled && config.cache.ttl_hours == 0 {
            return Err(ConfigError::Validation(
                "Cache TTL must be greater than 0".to_string(),
            ));
        }

        if config.output.verbose && config.output.quiet {
            return Err(ConfigError::Validation(
                "Cannot enable both verbose and quiet modes".to_string(),
            ));
        }

        for ext in &config.files.extensions {
            if ext.contains('/') || ext.contains('\\') || ext.contains('.') {
                return Err(ConfigError::Validation(format!(
                    "Invalid file extension: {}",
                    ext
                )));
            }
        }

        for pattern in &config.files.ignored_path_patterns {
            Regex::new(pattern).map_err(|e| {
                ConfigError::Validation(format!("Invalid ignore pattern '{}': {}", pattern, e))
            })?;
        }

        Ok(())
    }

    /// Get the effective worker count
    pub fn get_worker_count(config: &Config) -> usize {
        config.validation.workers.unwrap_or_else(num_cpus::get)
    }

    /// Convert configuration to Duration for cache TTL
    pub fn get_cache_ttl_duration(config: &Config) -> Duration {
        Duration::from_secs(config.cache.ttl_hours.saturating_mul(3600))
    }
}

fn env_string(env: &impl EnvProvider, suffix: &str) -> Option<String> {
    env.get(&format!("{ENV_PREFIX}{suffix}"))
        .filter(|value| !value.is_empty())
}

fn env_parse<T: FromStr>(env: &impl EnvProvider, suffix: &str) -> Result<Option<T>> {
    match env_string(env, suffix) {
        Some(raw) => raw.parse().map(Some).map_err(|_| {
            ConfigError::Environment(format!("Invalid {ENV_PREFIX}{suffix} value: {}", raw))
        }),
        None => Ok(None),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
