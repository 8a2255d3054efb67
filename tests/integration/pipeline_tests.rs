use std::sync::Arc;

use validate_manifests::config::Config;
use validate_manifests::error::ErrorKind;
use validate_manifests::resource::ResultStatus;
use validate_manifests::schema_loader::ReferenceFetcher;
use validate_manifests::validator::ValidationEngine;

use crate::common::mocks::{RecordingFetcher, RecordingReporter};
use crate::common::test_helpers::*;

fn engine(config: Config) -> ValidationEngine {
    let fetcher = ReferenceFetcher::from_config(&config).unwrap();
    ValidationEngine::new(shared(config), Arc::new(fetcher))
}

#[tokio::test]
async fn test_mixed_stream_against_local_registry() {
    let registry = SchemaRegistry::standard();
    let engine = engine(config_for(&registry));

    let input = format!("{}---\n{}---\n{}", VALID_DEPLOYMENT, INVALID_DEPLOYMENT, SERVICE);
    let mut reporter = RecordingReporter::new();
    let summary = engine
        .validate_input(input.as_bytes(), "stack.yaml", &mut reporter)
        .await
        .unwrap();

    assert_eq!(reporter.results.len(), 3);
    assert_eq!(reporter.flushes, 1);

    let statuses: Vec<_> = reporter.results.iter().map(|r| r.status()).collect();
    assert_eq!(
        statuses,
        vec![ResultStatus::Valid, ResultStatus::Invalid, ResultStatus::Valid]
    );

    let broken = &reporter.results[1];
    assert!(broken.errors.iter().any(|v| v.field == "/spec/replicas"));
    assert!(broken.errors.iter().any(|v| v.field == "/spec"));

    assert_eq!(summary.invalid, 1);
    assert!(summary.errors.is_empty());
    assert!(!summary.success());
}

#[tokio::test]
async fn test_clean_run_succeeds() {
    let registry = SchemaRegistry::standard();
    let engine = engine(config_for(&registry));

    let input = format!("{}---\n{}", VALID_DEPLOYMENT, SERVICE);
    let mut reporter = RecordingReporter::new();
    let summary = engine
        .validate_input(input.as_bytes(), "stack.yaml", &mut reporter)
        .await
        .unwrap();

    assert_eq!(summary.documents, 2);
    assert_eq!(summary.valid, 2);
    assert!(summary.success());
}

#[tokio::test]
async fn test_unknown_kind_fails_unless_tolerated() {
    let registry = SchemaRegistry::standard();
    let widget = "apiVersion: example.com/v1\nkind: Widget\nmetadata:\n  name: w\n";

    let output = engine(config_for(&registry))
        .validate_bytes(widget.as_bytes(), "widget.yaml")
        .await;
    assert_eq!(output.results.len(), 1);
    assert_eq!(output.errors.len(), 1);
    assert_eq!(output.errors[0].kind(), ErrorKind::SchemaUnavailable);

    let mut config = config_for(&registry);
    config.schema.ignore_missing_schemas = true;
    let output = engine(config)
        .validate_bytes(widget.as_bytes(), "widget.yaml")
        .await;
    assert!(output.errors.is_empty());
    assert_eq!(output.results[0].status(), ResultStatus::Skipped);
}

#[tokio::test]
async fn test_fallback_registry_is_used() {
    let empty = SchemaRegistry::new();
    let mirror = SchemaRegistry::standard();

    let mut config = config_for(&empty);
    config.schema.additional_schema_locations = vec![mirror.location()];

    let output = engine(config)
        .validate_bytes(SERVICE.as_bytes(), "svc.yaml")
        .await;

    assert!(output.errors.is_empty());
    assert_eq!(output.results[0].status(), ResultStatus::Valid);
}

#[tokio::test]
async fn test_strict_registry_directory() {
    let registry = SchemaRegistry::new();
    registry.add("master-standalone-strict", "service-v1.json", SERVICE_SCHEMA);

    let mut config = config_for(&registry);
    config.schema.strict = true;

    let output = engine(config)
        .validate_bytes(SERVICE.as_bytes(), "svc.yaml")
        .await;
    assert!(output.errors.is_empty());
    assert!(output.results[0].validated_against_schema);
}

#[tokio::test]
async fn test_skipped_kind_never_fetches() {
    let registry = SchemaRegistry::standard();
    let fetcher = Arc::new(RecordingFetcher::new());

    let mut config = config_for(&registry);
    config.validation.kinds_to_skip.insert("Service".to_string());
    let engine = ValidationEngine::new(shared(config), fetcher.clone());

    let output = engine.validate_bytes(SERVICE.as_bytes(), "svc.yaml").await;

    assert!(output.errors.is_empty());
    assert_eq!(output.results[0].status(), ResultStatus::Skipped);
    assert!(fetcher.requests().is_empty());
    assert!(engine.cache().is_empty());
}

#[tokio::test]
async fn test_rejected_kind_is_fatal_even_when_valid() {
    let registry = SchemaRegistry::standard();
    let mut config = config_for(&registry);
    config.validation.kinds_to_reject.insert("Service".to_string());

    let output = engine(config)
        .validate_bytes(SERVICE.as_bytes(), "svc.yaml")
        .await;

    assert_eq!(output.results.len(), 1);
    assert_eq!(output.errors.len(), 1);
    assert_eq!(output.errors[0].kind(), ErrorKind::ProhibitedKind);
}

#[tokio::test]
async fn test_shared_identity_is_fetched_once_across_files() {
    let registry = SchemaRegistry::standard();
    let reference = format!("{}/master-standalone/service-v1.json", registry.location());
    let fetcher = Arc::new(
        RecordingFetcher::new()
            .with_schema(&reference, SERVICE_SCHEMA)
            .with_delay(std::time::Duration::from_millis(20)),
    );

    let mut config = config_for(&registry);
    config.validation.workers = Some(4);
    config.validation.batch_size = 2;
    let engine = ValidationEngine::new(shared(config), fetcher.clone());

    let manifests = ManifestDir::new();
    let files: Vec<_> = (0..12)
        .map(|i| {
            manifests.write(
                &format!("svc-{i:02}.yaml"),
                &SERVICE.replace("name: web", &format!("name: web-{i}")),
            )
        })
        .collect();

    let mut reporter = RecordingReporter::new();
    let summary = engine.validate_files(files, &mut reporter).await.unwrap();

    assert_eq!(reporter.results.len(), 12);
    assert_eq!(fetcher.request_count(&reference), 1);
    assert_eq!(summary.cache.entries, 1);
    assert!(summary.success());
}

#[tokio::test]
async fn test_duplicates_across_files_are_reported() {
    let registry = SchemaRegistry::standard();
    let mut config = config_for(&registry);
    config.validation.workers = Some(1);
    let engine = engine(config);

    let manifests = ManifestDir::new();
    let first = manifests.write("a.yaml", SERVICE);
    let second = manifests.write("b.yaml", SERVICE);
    let other_namespace = manifests.write(
        "c.yaml",
        &SERVICE.replace("name: web", "name: web\n  namespace: staging"),
    );

    let mut reporter = RecordingReporter::new();
    let summary = engine
        .validate_files(vec![first, second, other_namespace], &mut reporter)
        .await
        .unwrap();

    assert_eq!(reporter.results.len(), 3);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors.errors()[0].kind(), ErrorKind::DuplicateResource);
    assert!(summary.errors.errors()[0].to_string().contains("b.yaml"));
    assert!(!summary.success());
}

#[tokio::test]
async fn test_generated_names_are_not_duplicates() {
    let registry = SchemaRegistry::standard();
    let engine = engine(config_for(&registry));

    let job = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  generateName: run-\n";
    let input = format!("{job}---\n{job}");
    let output = engine.validate_bytes(input.as_bytes(), "jobs.yaml").await;

    assert_eq!(output.results.len(), 2);
    assert!(output.errors.is_empty());
    assert_eq!(output.results[0].resource_name, "run-{{ generateName }}");
}

#[tokio::test]
async fn test_exit_on_error_stops_the_batch() {
    let registry = SchemaRegistry::standard();
    let mut config = config_for(&registry);
    config.validation.exit_on_error = true;
    let engine = engine(config);

    let input = format!("kind: Service\n---\n{}", SERVICE);
    let output = engine.validate_bytes(input.as_bytes(), "svc.yaml").await;

    assert!(output.halted);
    assert_eq!(output.results.len(), 1);
    assert_eq!(output.errors[0].kind(), ErrorKind::MissingField);
}

#[tokio::test]
async fn test_malformed_document_keeps_its_slot() {
    let registry = SchemaRegistry::standard();
    let engine = engine(config_for(&registry));

    let input = format!("{}---\nkind: [unclosed\n---\n{}", SERVICE, SERVICE.replace("web", "api"));
    let output = engine.validate_bytes(input.as_bytes(), "svc.yaml").await;

    assert_eq!(output.results.len(), 3);
    assert_eq!(output.errors.len(), 1);
    assert_eq!(output.errors[0].kind(), ErrorKind::Decode);
    assert_eq!(output.results[2].resource_name, "api");
}
