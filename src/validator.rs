//! Batch orchestration.
//!
//! Input files are grouped into batches of `validation.batch_size` and queued
//! on a bounded channel. A fixed pool of `tokio` workers pulls batches and runs
//! split, validate and duplicate detection sequentially inside each batch; all
//! workers share one [`SchemaCache`] and one [`DuplicateDetector`]. A single
//! aggregator drains the results channel and feeds the [`Reporter`].
//!
//! Ordering: documents keep their order inside a batch, batches are reported
//! in the order they finish.
//!
//! Fail-fast: with `exit_on_error`, the first halting error stops the batch
//! that hit it and raises a shared flag. Workers check the flag before taking
//! another batch and the dispatcher stops queueing, so batches already running
//! on other workers still complete.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::{CacheStats, SchemaCache};
use crate::config::{Config, ConfigManager};
use crate::duplicates::DuplicateDetector;
use crate::error::{MultiError, Result, ValidationError};
use crate::output::Reporter;
use crate::resource::{ResourceValidator, ResultStatus, ValidationResult};
use crate::schema_loader::{SchemaFetcher, SchemaLoader};
use crate::splitter;

/// Everything one unit of work produced
#[derive(Debug, Default)]
pub struct BatchOutput {
    pub results: Vec<ValidationResult>,
    pub errors: Vec<ValidationError>,
    /// A halting error cut the batch short
    pub halted: bool,
}

impl BatchOutput {
    fn absorb(&mut self, other: BatchOutput) {
        self.results.extend(other.results);
        self.errors.extend(other.errors);
        self.halted |= other.halted;
    }
}

/// Totals for a finished run
#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    pub documents: usize,
    pub valid: usize,
    pub invalid: usize,
    pub skipped: usize,
    #[serde(skip)]
    pub errors: MultiError,
    pub cache: CacheStats,
}

impl RunSummary {
    fn record(&mut self, result: &ValidationResult) {
        self.documents += 1;
        match result.status() {
            ResultStatus::Valid => self.valid += 1,
            ResultStatus::Invalid => self.invalid += 1,
            ResultStatus::Skipped => self.skipped += 1,
        }
    }

    /// No schema violations and no fatal errors anywhere in the run
    pub fn success(&self) -> bool {
        self.invalid == 0 && self.errors.is_empty()
    }
}

/// The per-document pipeline shared by every worker
struct Pipeline {
    config: Arc<Config>,
    validator: ResourceValidator,
    duplicates: DuplicateDetector,
}

impl Pipeline {
    async fn validate_bytes(&self, input: &[u8], file_name: &str) -> BatchOutput {
        let exit_on_error = self.config.validation.exit_on_error;
        let mut output = BatchOutput::default();

        for document in splitter::split(input, file_name) {
            let outcome = self.validator.validate(&document).await;
            let result = outcome.result;

            match outcome.error {
                Some(error) => {
                    let halts = error.halts_batch();
                    output.results.push(result);
                    output.errors.push(error);
                    if exit_on_error && halts {
                        debug!(file = file_name, "exit-on-error: abandoning rest of batch");
                        output.halted = true;
                        return output;
                    }
                }
                None => {
                    if !result.kind.is_empty()
                        && !result.name_is_generated
                        && let Err(duplicate) = self.duplicates.observe(
                            &result.api_version,
                            &result.kind,
                            &result.resource_namespace,
                            &result.resource_name,
                            &self.config.validation.default_namespace,
                            &result.file_name,
                        )
                    {
                        output.errors.push(duplicate);
                    }
                    output.results.push(result);
                }
            }
        }

        output
    }

    async fn validate_file(&self, path: &Path) -> BatchOutput {
        match tokio::fs::read(path).await {
            Ok(bytes) => self.validate_bytes(&bytes, &path.display().to_string()).await,
            Err(source) => BatchOutput {
                results: Vec::new(),
                errors: vec![ValidationError::ReadSource {
                    path: path.to_path_buf(),
                    source,
                }],
                halted: self.config.validation.exit_on_error,
            },
        }
    }

    async fn process_batch(&self, batch: Vec<PathBuf>) -> BatchOutput {
        let mut output = BatchOutput::default();
        for path in &batch {
            output.absorb(self.validate_file(path).await);
            if output.halted {
                break;
            }
        }
        output
    }
}

/// Runs validation over many inputs with a fixed worker pool
pub struct ValidationEngine {
    pipeline: Arc<Pipeline>,
    cache: Arc<SchemaCache>,
}

impl ValidationEngine {
    pub fn new(config: Arc<Config>, fetcher: Arc<dyn SchemaFetcher>) -> Self {
        Self::with_cache(config, fetcher, Arc::new(SchemaCache::new()))
    }

    /// Engine reusing a caller-owned schema cache
    pub fn with_cache(
        config: Arc<Config>,
        fetcher: Arc<dyn SchemaFetcher>,
        cache: Arc<SchemaCache>,
    ) -> Self {
        let loader = Arc::new(SchemaLoader::new(fetcher, Arc::clone(&cache)));
        let pipeline = Pipeline {
            validator: ResourceValidator::new(Arc::clone(&config), loader),
            duplicates: DuplicateDetector::new(),
            config,
        };

        Self {
            pipeline: Arc::new(pipeline),
            cache,
        }
    }

    pub fn config(&self) -> &Config {
        &self.pipeline.config
    }

    pub fn cache(&self) -> &Arc<SchemaCache> {
        &self.cache
    }

    /// Validate one in-memory stream without reporting
    pub async fn validate_bytes(&self, input: &[u8], file_name: &str) -> BatchOutput {
        self.pipeline.validate_bytes(input, file_name).await
    }

    /// Validate one in-memory stream, e.g. stdin, reporting every result
    pub async fn validate_input(
        &self,
        input: &[u8],
        file_name: &str,
        reporter: &mut dyn Reporter,
    ) -> Result<RunSummary> {
        let output = self.pipeline.validate_bytes(input, file_name).await;

        let mut summary = RunSummary::default();
        for result in &output.results {
            reporter.put(result)?;
            summary.record(result);
        }
        summary.errors.extend(output.errors);
        reporter.flush()?;

        summary.cache = self.cache.stats();
        Ok(summary)
    }

    /// Validate files across the worker pool, reporting every result
    pub async fn validate_files(
        &self,
        files: Vec<PathBuf>,
        reporter: &mut dyn Reporter,
    ) -> Result<RunSummary> {
        let batch_size = self.pipeline.config.validation.batch_size.max(1);
        let batches: Vec<Vec<PathBuf>> = files.chunks(batch_size).map(<[PathBuf]>::to_vec).collect();
        let workers = ConfigManager::get_worker_count(&self.pipeline.config)
            .min(batches.len())
            .max(1);
        debug!(files = files.len(), batches = batches.len(), workers, "starting run");

        let halt = Arc::new(AtomicBool::new(false));
        let (work_tx, work_rx) = mpsc::channel::<Vec<PathBuf>>(workers);
        let work_rx = Arc::new(Mutex::new(work_rx));
        let (result_tx, mut result_rx) = mpsc::channel::<BatchOutput>(workers);

        let dispatcher = {
            let halt = Arc::clone(&halt);
            tokio::spawn(async move {
                for batch in batches {
                    if halt.load(Ordering::SeqCst) {
                        debug!("exit-on-error: no further batches queued");
                        break;
                    }
                    if work_tx.send(batch).await.is_err() {
                        break;
                    }
                }
            })
        };

        let handles: Vec<JoinHandle<()>> = (0..workers)
            .map(|worker| {
                let pipeline = Arc::clone(&self.pipeline);
                let work_rx = Arc::clone(&work_rx);
                let result_tx = result_tx.clone();
                let halt = Arc::clone(&halt);

                tokio::spawn(async move {
                    loop {
                        if halt.load(Ordering::SeqCst) {
                            break;
                        }
                        let Some(batch) = work_rx.lock().await.recv().await else {
                            break;
                        };

                        debug!(worker, files = batch.len(), "processing batch");
                        let output = pipeline.process_batch(batch).await;
                        if output.halted {
                            halt.store(true, Ordering::SeqCst);
                        }
                        if result_tx.send(output).await.is_err() {
                            break;
                        }
                    }
                })
            })
            .collect();
        drop(work_rx);
        drop(result_tx);

        let mut summary = RunSummary::default();
        while let Some(output) = result_rx.recv().await {
            for result in &output.results {
                reporter.put(result)?;
                summary.record(result);
            }
            summary.errors.extend(output.errors);
        }

        for handle in handles.into_iter().chain(std::iter::once(dispatcher)) {
            handle.await.map_err(|e| ValidationError::Concurrency {
                details: format!("Task join error: {}", e),
            })?;
        }

        reporter.flush()?;
        summary.cache = self.cache.stats();
        Ok(summary)
    }
}
