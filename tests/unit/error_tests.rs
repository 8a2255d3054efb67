use validate_manifests::error::{ErrorKind, FetchAttempts, FetchFailure, MultiError, ValidationError};

#[test]
fn test_attempts_keep_location_order() {
    let error = ValidationError::SchemaUnavailable {
        file: "deploy.yaml".to_string(),
        kind: "Widget".to_string(),
        api_version: "example.com/v1".to_string(),
        attempts: FetchAttempts(vec![
            FetchFailure {
                reference: "https://a.example/master-standalone/widget-v1-example.com.json".to_string(),
                reason: "HTTP status error: 404".to_string(),
            },
            FetchFailure {
                reference: "https://b.example/master-standalone/widget-v1-example.com.json".to_string(),
                reason: "HTTP status error: 404".to_string(),
            },
        ]),
    };

    assert_eq!(error.kind(), ErrorKind::SchemaUnavailable);
    let ValidationError::SchemaUnavailable { attempts, .. } = &error else {
        unreachable!();
    };
    let hosts: Vec<_> = attempts
        .references()
        .map(|r| r.split('/').nth(2).unwrap())
        .collect();
    assert_eq!(hosts, vec!["a.example", "b.example"]);
}

#[test]
fn test_only_duplicates_keep_a_batch_running() {
    let duplicate = ValidationError::DuplicateResource {
        file: "b.yaml".to_string(),
        api_version: "v1".to_string(),
        kind: "Service".to_string(),
        namespace: "default".to_string(),
        name: "web".to_string(),
    };
    let prohibited = ValidationError::ProhibitedKind {
        file: "a.yaml".to_string(),
        kind: "Secret".to_string(),
    };
    let decode = ValidationError::Decode {
        file: "a.yaml".to_string(),
        details: "did not find expected key".to_string(),
    };

    assert!(!duplicate.halts_batch());
    assert!(prohibited.halts_batch());
    assert!(decode.halts_batch());
}

#[test]
fn test_multi_error_collects_in_order() {
    let mut errors = MultiError::new();
    assert!(errors.is_empty());

    errors.push(ValidationError::Config("first".to_string()));
    errors.push(ValidationError::Config("second".to_string()));

    assert_eq!(errors.len(), 2);
    let message = errors.to_string();
    assert!(message.find("first").unwrap() < message.find("second").unwrap());
    assert!(errors.into_result().is_err());
}
