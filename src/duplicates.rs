use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use crate::error::{Result, ValidationError};

/// (apiVersion, kind, namespace, name) of one named resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    pub api_version: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

/// Remembers every named resource seen during a run.
///
/// Shared by all workers; two workers handling same-named resources from
/// different batches still collide on the single set.
#[derive(Debug, Default)]
pub struct DuplicateDetector {
    seen: Mutex<HashSet<ResourceKey>>,
}

impl DuplicateDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a resource, failing if the same key was recorded before.
    ///
    /// Unnamed resources are never recorded. An empty namespace resolves to
    /// `default_namespace`.
    pub fn observe(
        &self,
        api_version: &str,
        kind: &str,
        namespace: &str,
        name: &str,
        default_namespace: &str,
        file: &str,
    ) -> Result<()> {
        if name.is_empty() {
            return Ok(());
        }

        let key = ResourceKey {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
            namespace: if namespace.is_empty() {
                default_namespace.to_string()
            } else {
                namespace.to_string()
            },
            name: name.to_string(),
        };

        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        if seen.contains(&key) {
            return Err(ValidationError::DuplicateResource {
                file: file.to_string(),
                api_version: key.api_version,
                kind: key.kind,
                namespace: key.namespace,
                name: key.name,
            });
        }
        seen.insert(key);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
