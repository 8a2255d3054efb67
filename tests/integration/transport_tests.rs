use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use validate_manifests::cache::DiskCache;
use validate_manifests::config::Config;
use validate_manifests::error::{ErrorKind, ValidationError};
use validate_manifests::resource::ResultStatus;
use validate_manifests::schema_loader::{ReferenceFetcher, SchemaFetcher};
use validate_manifests::validator::ValidationEngine;

use crate::common::test_helpers::*;

/// Nothing listens on the discard port, so every request is refused
const UNREACHABLE: &str = "http://127.0.0.1:9";

fn offline_config() -> Config {
    let mut config = Config::default();
    config.schema.schema_location = Some(UNREACHABLE.to_string());
    config.network.retry_attempts = 0;
    config.network.timeout_seconds = 2;
    config
}

#[tokio::test]
async fn test_file_url_location() {
    let registry = SchemaRegistry::standard();
    let mut config = Config::default();
    config.schema.schema_location = Some(format!("file://{}", registry.location()));

    let fetcher = ReferenceFetcher::from_config(&config).unwrap();
    let engine = ValidationEngine::new(shared(config), Arc::new(fetcher));
    let output = engine.validate_bytes(SERVICE.as_bytes(), "svc.yaml").await;

    assert!(output.errors.is_empty());
    assert_eq!(output.results[0].status(), ResultStatus::Valid);
}

#[tokio::test]
async fn test_missing_local_schema_is_not_found() {
    let registry = SchemaRegistry::new();
    let fetcher = ReferenceFetcher::from_config(&config_for(&registry)).unwrap();

    let reference = registry.path().join("master-standalone/pod-v1.json");
    let result = fetcher.fetch(&reference.display().to_string()).await;

    assert!(matches!(result, Err(ValidationError::SchemaNotFound { .. })));
}

#[tokio::test]
async fn test_unreachable_registry_reports_the_attempt() {
    let config = offline_config();
    let fetcher = ReferenceFetcher::from_config(&config).unwrap();
    let engine = ValidationEngine::new(shared(config), Arc::new(fetcher));

    let output = engine.validate_bytes(SERVICE.as_bytes(), "svc.yaml").await;

    assert_eq!(output.errors.len(), 1);
    assert_eq!(output.errors[0].kind(), ErrorKind::SchemaUnavailable);
    assert!(output.errors[0].to_string().contains(UNREACHABLE));
}

#[tokio::test]
async fn test_persisted_schema_survives_an_outage() {
    let cache_dir = TempDir::new().unwrap();
    let reference = format!("{}/master-standalone/service-v1.json", UNREACHABLE);

    DiskCache::new(cache_dir.path().to_path_buf(), Duration::from_secs(3600))
        .set(&reference, SERVICE_SCHEMA.as_bytes())
        .await
        .unwrap();

    let mut config = offline_config();
    config.cache.enabled = true;
    config.cache.directory = cache_dir.path().to_path_buf();

    let fetcher = ReferenceFetcher::from_config(&config).unwrap();
    let engine = ValidationEngine::new(shared(config), Arc::new(fetcher));
    let output = engine.validate_bytes(SERVICE.as_bytes(), "svc.yaml").await;

    assert!(output.errors.is_empty());
    assert_eq!(output.results[0].status(), ResultStatus::Valid);
}
