use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::{FetchAttempts, ValidationError};
use crate::schema_loader::CompiledSchema;

/// Result type for cache operations
pub type CacheResult<T> = Result<T, ValidationError>;

/// Key of one schema in the run cache: the primary reference it resolves to.
///
/// Two documents with the same kind and apiVersion under the same
/// configuration always produce the same identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaIdentity(String);

impl SchemaIdentity {
    pub fn new(primary_reference: impl Into<String>) -> Self {
        Self(primary_reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemaIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of resolving one schema identity
#[derive(Debug, Clone)]
pub enum CacheEntry {
    Found(Arc<CompiledSchema>),
    /// Every location failed; never refetched during the run
    Missing(FetchAttempts),
}

impl CacheEntry {
    pub fn is_missing(&self) -> bool {
        matches!(self, CacheEntry::Missing(_))
    }
}

/// Counters describing how the run cache was used
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

type Slot = Arc<OnceCell<CacheEntry>>;

/// Compiled schemas shared by every worker of one run.
///
/// A single lock guards the identity map. Each identity owns a cell that is
/// filled at most once, so concurrent lookups of the same identity wait for
/// one resolution instead of fetching in parallel, and the map lock is never
/// held across a fetch. Entries are never evicted.
#[derive(Default)]
pub struct SchemaCache {
    slots: Mutex<HashMap<SchemaIdentity, Slot>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SchemaIdentity, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolved entry for `identity`, if any
    pub fn get(&self, identity: &SchemaIdentity) -> Option<CacheEntry> {
        let slot = self.lock().get(identity).cloned()?;
        slot.get().cloned()
    }

    /// Store an entry, replacing any earlier one
    pub fn put(&self, identity: SchemaIdentity, entry: CacheEntry) {
        let slot = Arc::new(OnceCell::new_with(Some(entry)));
        self.lock().insert(identity, slot);
    }

    /// Return the entry for `identity`, running `resolve` only if no entry exists.
    ///
    /// `resolve` runs at most once per identity for the lifetime of the cache,
    /// however many callers race on it.
    pub async fn get_or_resolve<F, Fut>(&self, identity: &SchemaIdentity, resolve: F) -> CacheEntry
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CacheEntry>,
    {
        let slot = self
            .lock()
            .entry(identity.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let resolved_here = AtomicBool::new(false);
        let entry = slot
            .get_or_init(|| async {
                resolved_here.store(true, Ordering::Relaxed);
                resolve().await
            })
            .await
            .clone();

        if resolved_here.load(Ordering::Relaxed) {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!(schema = %identity, missing = entry.is_missing(), "schema cache miss");
        } else {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(schema = %identity, "schema cache hit");
        }

        entry
    }

    pub fn contains(&self, identity: &SchemaIdentity) -> bool {
        self.get(identity).is_some()
    }

    /// Number of resolved identities
    pub fn len(&self) -> usize {
        self.lock().values().filter(|slot| slot.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Metadata stored next to each persisted schema body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub key: String,
    pub reference: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub size_bytes: u64,
}

impl CacheMetadata {
    pub fn new(key: String, reference: String, ttl: Duration) -> Self {
        let now = Utc::now();
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(now + chrono::Duration::hours(24));

        Self {
            key,
            reference,
            created_at: now,
            expires_at,
            size_bytes: 0,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size_bytes = size;
        self
    }
}

#[derive(Debug, Default, Clone)]
pub struct CleanupStats {
    pub expired_entries: u64,
    pub removed_entries: u64,
    pub freed_bytes: u64,
    pub errors: Vec<String>,
}

/// Downloaded schema bodies persisted across runs with cacache
pub struct DiskCache {
    cache_dir: PathBuf,
    ttl: Duration,
}

impl DiskCache {
    pub fn new(cache_dir: PathBuf, ttl: Duration) -> Self {
        Self { cache_dir, ttl }
    }

    /// Stable key for a schema reference
    pub fn generate_key(reference: &str) -> String {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        reference.hash(&mut hasher);
        format!("schema_{:x}", hasher.finish())
    }

    /// Body stored for `reference`, unless absent or expired
    pub async fn get(&self, reference: &str) -> CacheResult<Option<Vec<u8>>> {
        let key = Self::generate_key(reference);

        match self.get_metadata(&key).await? {
            Some(metadata) if !metadata.is_expired() => {}
            Some(_) => {
                let _ = self.remove(&key).await;
                return Ok(None);
            }
            None => return Ok(None),
        }

        match cacache::read(&self.cache_dir, &key).await {
            Ok(data) => Ok(Some(data)),
            Err(cacache::Error::EntryNotFound(_, _)) => Ok(None),
            Err(e) => Err(ValidationError::Cache(format!(
                "Failed to read from disk cache: {}",
                e
            ))),
        }
    }

    pub async fn set(&self, reference: &str, data: &[u8]) -> CacheResult<()> {
        let key = Self::generate_key(reference);

        cacache::write(&self.cache_dir, &key, data)
            .await
            .map_err(|e| ValidationError::Cache(format!("Failed to write to disk cache: {}", e)))?;

        let metadata = CacheMetadata::new(key.clone(), reference.to_string(), self.ttl)
            .with_size(data.len() as u64);
        self.set_metadata(&key, &metadata).await
    }

    async fn remove(&self, key: &str) -> CacheResult<()> {
        let _ = cacache::remove(&self.cache_dir, key).await;
        let _ = fs::remove_file(self.metadata_path(key)).await;
        Ok(())
    }

    /// Drop every expired body and its metadata
    pub async fn cleanup_expired(&self) -> CacheResult<CleanupStats> {
        let mut cleanup_stats = CleanupStats::default();

        let entries = match cacache::index::ls(&self.cache_dir).collect::<Result<Vec<_>, _>>() {
            Ok(entries) => entries,
            // No index yet means nothing has been cached
            Err(_) => return Ok(cleanup_stats),
        };

        for entry in entries {
            if let Ok(Some(metadata)) = self.get_metadata(&entry.key).await
                && metadata.is_expired()
            {
                cleanup_stats.expired_entries += 1;
                cleanup_stats.freed_bytes += entry.size as u64;

                match self.remove(&entry.key).await {
                    Ok(()) => cleanup_stats.removed_entries += 1,
                    Err(e) => cleanup_stats
                        .errors
                        .push(format!("Failed to remove {}: {}", entry.key, e)),
                }
            }
        }

        Ok(cleanup_stats)
    }

    async fn get_metadata(&self, key: &str) -> CacheResult<Option<CacheMetadata>> {
        match fs::read_to_string(self.metadata_path(key)).await {
            Ok(content) => serde_json::from_str(&content)
                .map(Some)
                .map_err(|e| ValidationError::Cache(format!("Failed to parse metadata: {}", e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ValidationError::Cache(format!(
                "Failed to read metadata: {}",
                e
            ))),
        }
    }

    async fn set_metadata(&self, key: &str, metadata: &CacheMetadata) -> CacheResult<()> {
        let metadata_path = self.metadata_path(key);

        if let Some(parent) = metadata_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                ValidationError::Cache(format!("Failed to create metadata directory: {}", e))
            })?;
        }

        let content = serde_json::to_string_pretty(metadata)
            .map_err(|e| ValidationError::Cache(format!("Failed to serialize metadata: {}", e)))?;

        fs::write(&metadata_path, content)
            .await
            .map_err(|e| ValidationError::Cache(format!("Failed to write metadata: {}", e)))
    }

    fn metadata_path(&self, key: &str) -> PathBuf {
        self.cache_dir
            .join("metadata")
            .join(format!("{}.json", key))
    }
}
