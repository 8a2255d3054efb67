use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use validate_manifests::config::Config;

pub const DEPLOYMENT_SCHEMA: &str = r#"{
    "$schema": "http://json-schema.org/schema#",
    "type": "object",
    "required": ["metadata", "spec"],
    "properties": {
        "apiVersion": {"type": "string"},
        "kind": {"type": "string"},
        "metadata": {"type": "object"},
        "spec": {
            "type": "object",
            "required": ["template"],
            "properties": {
                "replicas": {"type": "integer", "format": "int32"},
                "template": {"type": "object"}
            }
        }
    }
}"#;

pub const SERVICE_SCHEMA: &str = r#"{
    "type": "object",
    "properties": {
        "spec": {
            "type": "object",
            "properties": {
                "ports": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "port": {"type": "integer", "format": "int32"},
                            "targetPort": {
                                "oneOf": [{"type": "string"}, {"type": "integer"}],
                                "format": "int-or-string"
                            }
                        }
                    }
                }
            }
        }
    }
}"#;

pub const CONFIGMAP_SCHEMA: &str = r#"{
    "type": "object",
    "properties": {
        "data": {"type": "object", "additionalProperties": {"type": "string"}}
    }
}"#;

pub const VALID_DEPLOYMENT: &str = "apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
  namespace: prod
spec:
  replicas: 2
  template: {}
";

pub const INVALID_DEPLOYMENT: &str = "apiVersion: apps/v1
kind: Deployment
metadata:
  name: broken
spec:
  replicas: two
";

pub const SERVICE: &str = "apiVersion: v1
kind: Service
metadata:
  name: web
spec:
  ports:
    - port: 80
      targetPort: http
";

/// Schema tree laid out the way a schema registry serves it
pub struct SchemaRegistry {
    root: TempDir,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self {
            root: TempDir::new().unwrap(),
        }
    }

    /// Registry with the Deployment, Service and ConfigMap schemas under `master-standalone`
    pub fn standard() -> Self {
        let registry = Self::new();
        registry.add("master-standalone", "deployment-v1-apps.json", DEPLOYMENT_SCHEMA);
        registry.add("master-standalone", "service-v1.json", SERVICE_SCHEMA);
        registry.add("master-standalone", "configmap-v1.json", CONFIGMAP_SCHEMA);
        registry
    }

    pub fn add(&self, version_dir: &str, file_name: &str, body: &str) -> PathBuf {
        let dir = self.root.path().join(version_dir);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(file_name);
        fs::write(&path, body).unwrap();
        path
    }

    pub fn location(&self) -> String {
        self.root.path().display().to_string()
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Run configuration pointing at `registry`
pub fn config_for(registry: &SchemaRegistry) -> Config {
    let mut config = Config::default();
    config.schema.schema_location = Some(registry.location());
    config
}

pub fn shared(config: Config) -> Arc<Config> {
    Arc::new(config)
}

/// Directory of manifest files
pub struct ManifestDir {
    root: TempDir,
}

impl ManifestDir {
    pub fn new() -> Self {
        Self {
            root: TempDir::new().unwrap(),
        }
    }

    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.root.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }
}

impl Default for ManifestDir {
    fn default() -> Self {
        Self::new()
    }
}
