use async_trait::async_trait;
use jsonschema::{Draft, Validator};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::{CacheEntry, DiskCache, SchemaCache, SchemaIdentity};
use crate::config::{Config, ConfigManager, SchemaConfig};
use crate::error::{FetchAttempts, FetchFailure, Result, ValidationError};
use crate::http_client::{AsyncHttpClient, HttpClientConfig};
use crate::locator;
use crate::resource::SchemaViolation;

/// Format names used by the Kubernetes schemas that carry no constraint
const PERMISSIVE_FORMATS: [&str; 4] = ["int64", "byte", "int32", "int-or-string"];

/// Fetch the raw bytes behind a schema reference, or fail
#[async_trait]
pub trait SchemaFetcher: Send + Sync {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>>;
}

/// Where a schema reference points
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaSource {
    Local(PathBuf),
    Remote(String),
}

impl SchemaSource {
    pub fn from_reference(reference: &str) -> Self {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            SchemaSource::Remote(reference.to_string())
        } else {
            let path = reference.strip_prefix("file://").unwrap_or(reference);
            SchemaSource::Local(PathBuf::from(path))
        }
    }
}

/// Production fetcher: HTTP(S) through [`AsyncHttpClient`], everything else from disk
pub struct ReferenceFetcher {
    http_client: AsyncHttpClient,
    disk_cache: Option<DiskCache>,
}

impl ReferenceFetcher {
    pub fn new(http_client: AsyncHttpClient, disk_cache: Option<DiskCache>) -> Self {
        Self {
            http_client,
            disk_cache,
        }
    }

    /// Build the fetcher described by the network and cache sections of `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let http_client = AsyncHttpClient::new(HttpClientConfig::from(&config.network))?;
        let disk_cache = config.cache.enabled.then(|| {
            DiskCache::new(
                config.cache.directory.clone(),
                ConfigManager::get_cache_ttl_duration(config),
            )
        });
        Ok(Self::new(http_client, disk_cache))
    }

    pub fn disk_cache(&self) -> Option<&DiskCache> {
        self.disk_cache.as_ref()
    }

    async fn fetch_local(&self, path: &Path) -> Result<Vec<u8>> {
        tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ValidationError::SchemaNotFound {
                reference: path.display().to_string(),
            },
            _ => ValidationError::Io(e),
        })
    }

    async fn fetch_remote(&self, url: &str) -> Result<Vec<u8>> {
        if let Some(disk_cache) = &self.disk_cache {
            match disk_cache.get(url).await {
                Ok(Some(data)) => {
                    debug!(url, "schema served from disk cache");
                    return Ok(data);
                }
                Ok(None) => {}
                Err(e) => warn!(url, error = %e, "disk cache read failed"),
            }
        }

        let data = self.http_client.download_schema(url).await?;

        if let Some(disk_cache) = &self.disk_cache
            && let Err(e) = disk_cache.set(url, &data).await
        {
            warn!(url, error = %e, "disk cache write failed");
        }

        Ok(data)
    }
}

#[async_trait]
impl SchemaFetcher for ReferenceFetcher {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>> {
        match SchemaSource::from_reference(reference) {
            SchemaSource::Local(path) => self.fetch_local(&path).await,
            SchemaSource::Remote(url) => self.fetch_remote(&url).await,
        }
    }
}

/// A schema compiled and ready to evaluate documents
pub struct CompiledSchema {
    reference: String,
    validator: Validator,
}

impl fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSchema")
            .field("reference", &self.reference)
            .finish_non_exhaustive()
    }
}

impl CompiledSchema {
    /// Parse and compile a schema body.
    ///
    /// The `$schema` keyword is dropped and draft 4 is assumed, which is what the
    /// Kubernetes schema registries publish.
    pub fn compile(reference: &str, body: &[u8]) -> Result<Self> {
        let mut schema: Value =
            serde_json::from_slice(body).map_err(|e| ValidationError::SchemaParsing {
                reference: reference.to_string(),
                details: e.to_string(),
            })?;
        if let Some(object) = schema.as_object_mut() {
            object.remove("$schema");
        }

        let mut options = jsonschema::options();
        options.with_draft(Draft::Draft4);
        for format in PERMISSIVE_FORMATS {
            options.with_format(format, |_: &str| true);
        }

        let validator = options
            .build(&schema)
            .map_err(|e| ValidationError::SchemaParsing {
                reference: reference.to_string(),
                details: e.to_string(),
            })?;

        Ok(Self {
            reference: reference.to_string(),
            validator,
        })
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Every violation of the schema by `instance`, in evaluation order
    pub fn violations(&self, instance: &Value) -> Vec<SchemaViolation> {
        self.validator
            .iter_errors(instance)
            .map(|error| {
                let path = error.instance_path.to_string();
                SchemaViolation {
                    field: if path.is_empty() {
                        "(root)".to_string()
                    } else {
                        path
                    },
                    description: error.to_string(),
                }
            })
            .collect()
    }
}

/// Resolves schemas for (kind, apiVersion) pairs through the shared run cache
pub struct SchemaLoader {
    fetcher: Arc<dyn SchemaFetcher>,
    cache: Arc<SchemaCache>,
}

impl SchemaLoader {
    pub fn new(fetcher: Arc<dyn SchemaFetcher>, cache: Arc<SchemaCache>) -> Self {
        Self { fetcher, cache }
    }

    /// Cache entry for the schema of `kind`/`api_version`.
    ///
    /// On a miss the primary location and then each fallback are tried in
    /// order; the first one that fetches and compiles wins. When all of them
    /// fail the failure is cached too, so the identity is never retried.
    pub async fn load(&self, kind: &str, api_version: &str, config: &SchemaConfig) -> CacheEntry {
        let references = locator::schema_locations(kind, api_version, config);
        let identity = SchemaIdentity::new(references[0].clone());

        self.cache
            .get_or_resolve(&identity, || self.resolve(references))
            .await
    }

    async fn resolve(&self, references: Vec<String>) -> CacheEntry {
        let mut attempts = Vec::new();

        for (position, reference) in references.iter().enumerate() {
            debug!(reference = %reference, "fetching schema");
            let outcome = match self.fetcher.fetch(reference).await {
                Ok(body) => CompiledSchema::compile(reference, &body),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(schema) => {
                    if position > 0 {
                        warn!(reference = %reference, "schema resolved from fallback location");
                    }
                    return CacheEntry::Found(Arc::new(schema));
                }
                Err(e) => attempts.push(FetchFailure {
                    reference: reference.clone(),
                    reason: e.to_string(),
                }),
            }
        }

        CacheEntry::Missing(FetchAttempts(attempts))
    }

    pub fn cache(&self) -> &Arc<SchemaCache> {
        &self.cache
    }
}
