use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use validate_manifests::error::{Result, ValidationError};
use validate_manifests::output::Reporter;
use validate_manifests::resource::ValidationResult;
use validate_manifests::schema_loader::SchemaFetcher;

/// In-memory fetcher that records every reference it is asked for
#[derive(Default)]
pub struct RecordingFetcher {
    bodies: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl RecordingFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(mut self, reference: &str, body: &str) -> Self {
        self.bodies.insert(reference.to_string(), body.as_bytes().to_vec());
        self
    }

    /// Hold every fetch open for `delay` so concurrent callers overlap
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self, reference: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.as_str() == reference)
            .count()
    }
}

#[async_trait]
impl SchemaFetcher for RecordingFetcher {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>> {
        self.requests.lock().unwrap().push(reference.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.bodies
            .get(reference)
            .cloned()
            .ok_or_else(|| ValidationError::SchemaNotFound {
                reference: reference.to_string(),
            })
    }
}

/// Reporter that keeps every result and checks the put/flush contract
#[derive(Default)]
pub struct RecordingReporter {
    pub results: Vec<ValidationResult>,
    pub flushes: usize,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file_names(&self) -> Vec<String> {
        self.results.iter().map(|r| r.file_name.clone()).collect()
    }
}

impl Reporter for RecordingReporter {
    fn put(&mut self, result: &ValidationResult) -> Result<()> {
        assert_eq!(self.flushes, 0, "put after flush");
        self.results.push(result.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }
}
