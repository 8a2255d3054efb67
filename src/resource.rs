//! Per-document validation: identity extraction, kind policy and schema evaluation.

use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::CacheEntry;
use crate::config::Config;
use crate::error::ValidationError;
use crate::schema_loader::SchemaLoader;
use crate::splitter::Document;

/// One place where a document does not conform to its schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaViolation {
    /// JSON pointer into the document, `(root)` for the document itself
    pub field: String,
    pub description: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.description)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Valid,
    Invalid,
    Skipped,
}

/// The outcome for one document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationResult {
    pub file_name: String,
    pub kind: String,
    pub api_version: String,
    pub resource_name: String,
    pub resource_namespace: String,
    /// `resource_name` is a placeholder derived from `metadata.generateName`
    pub name_is_generated: bool,
    pub validated_against_schema: bool,
    pub errors: Vec<SchemaViolation>,
}

impl ValidationResult {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            ..Default::default()
        }
    }

    /// `namespace/name`, or just `name` when no namespace was declared
    pub fn qualified_name(&self) -> String {
        if self.resource_namespace.is_empty() {
            self.resource_name.clone()
        } else {
            format!("{}/{}", self.resource_namespace, self.resource_name)
        }
    }

    pub fn status(&self) -> ResultStatus {
        if self.kind.is_empty() || !self.validated_against_schema {
            ResultStatus::Skipped
        } else if !self.errors.is_empty() {
            ResultStatus::Invalid
        } else {
            ResultStatus::Valid
        }
    }
}

/// Everything produced for one document
#[derive(Debug)]
pub struct ResourceOutcome {
    pub result: ValidationResult,
    /// Decoded body, absent when decoding failed or the document was empty
    pub body: Option<Value>,
    /// Fatal error for this document
    pub error: Option<ValidationError>,
}

impl ResourceOutcome {
    fn ok(result: ValidationResult, body: Option<Value>) -> Self {
        Self {
            result,
            body,
            error: None,
        }
    }

    fn failed(result: ValidationResult, body: Option<Value>, error: ValidationError) -> Self {
        Self {
            result,
            body,
            error: Some(error),
        }
    }
}

/// Validates decoded documents against their schemas under one run configuration
pub struct ResourceValidator {
    config: Arc<Config>,
    loader: Arc<SchemaLoader>,
}

impl ResourceValidator {
    pub fn new(config: Arc<Config>, loader: Arc<SchemaLoader>) -> Self {
        Self { config, loader }
    }

    pub async fn validate(&self, document: &Document<'_>) -> ResourceOutcome {
        let mut result = ValidationResult::new(&document.file_name);

        let body = match decode(&document.content) {
            Ok(Some(body)) => body,
            Ok(None) => return ResourceOutcome::ok(result, None),
            Err(details) => {
                let error = ValidationError::Decode {
                    file: document.file_name.clone(),
                    details,
                };
                return ResourceOutcome::failed(result, None, error);
            }
        };

        match required_string(&body, "kind") {
            Ok(kind) => result.kind = kind.to_string(),
            Err(details) => {
                let error = missing_field(&document.file_name, "kind", details);
                return ResourceOutcome::failed(result, Some(body), error);
            }
        }
        match required_string(&body, "apiVersion") {
            Ok(api_version) => result.api_version = api_version.to_string(),
            Err(details) => {
                let error = missing_field(&document.file_name, "apiVersion", details);
                return ResourceOutcome::failed(result, Some(body), error);
            }
        }
        apply_metadata(&body, &mut result);

        let validation = &self.config.validation;
        if validation.kinds_to_skip.contains(&result.kind) {
            debug!(file = %result.file_name, kind = %result.kind, "kind skipped");
            return ResourceOutcome::ok(result, Some(body));
        }
        if validation.kinds_to_reject.contains(&result.kind) {
            let error = ValidationError::ProhibitedKind {
                file: result.file_name.clone(),
                kind: result.kind.clone(),
            };
            return ResourceOutcome::failed(result, Some(body), error);
        }

        let schema_config = &self.config.schema;
        match self
            .loader
            .load(&result.kind, &result.api_version, schema_config)
            .await
        {
            CacheEntry::Found(schema) => {
                result.errors = schema.violations(&body);
                result.validated_against_schema = true;
                ResourceOutcome::ok(result, Some(body))
            }
            CacheEntry::Missing(_) if schema_config.ignore_missing_schemas => {
                warn!(
                    file = %result.file_name,
                    kind = %result.kind,
                    api_version = %result.api_version,
                    "no schema available, document not checked"
                );
                ResourceOutcome::ok(result, Some(body))
            }
            CacheEntry::Missing(attempts) => {
                let error = ValidationError::SchemaUnavailable {
                    file: result.file_name.clone(),
                    kind: result.kind.clone(),
                    api_version: result.api_version.clone(),
                    attempts,
                };
                ResourceOutcome::failed(result, Some(body), error)
            }
        }
    }
}

/// Decode one document. `Ok(None)` means there is nothing to validate.
fn decode(content: &[u8]) -> Result<Option<Value>, String> {
    if content.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let yaml: serde_yaml::Value = serde_yaml::from_slice(content).map_err(|e| e.to_string())?;
    match yaml_to_json(yaml)? {
        Value::Null => Ok(None),
        Value::Object(map) if map.is_empty() => Ok(None),
        body => Ok(Some(body)),
    }
}

/// Convert YAML to JSON, stringifying scalar mapping keys
fn yaml_to_json(value: serde_yaml::Value) -> Result<Value, String> {
    use serde_yaml::Value as Yaml;

    Ok(match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                let f = n.as_f64().unwrap_or(f64::NAN);
                Number::from_f64(f)
                    .map(Value::Number)
                    .ok_or_else(|| format!("unsupported number: {}", n))?
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<Result<_, _>>()?,
        ),
        Yaml::Mapping(mapping) => {
            let mut object = Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                object.insert(mapping_key(key)?, yaml_to_json(value)?);
            }
            Value::Object(object)
        }
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

fn mapping_key(key: serde_yaml::Value) -> Result<String, String> {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(s) => Ok(s),
        Yaml::Bool(b) => Ok(b.to_string()),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Null => Ok("null".to_string()),
        Yaml::Tagged(tagged) => mapping_key(tagged.value),
        other => Err(format!("unsupported mapping key: {:?}", other)),
    }
}

fn required_string<'a>(body: &'a Value, field: &str) -> Result<&'a str, String> {
    match body.get(field) {
        None => Err(format!("Missing a {} key", field)),
        Some(Value::Null) => Err(format!("Missing a {} value", field)),
        Some(Value::String(s)) if s.is_empty() => Err(format!("Missing a {} value", field)),
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(format!("{} must be a string, found {}", field, other)),
    }
}

fn missing_field(file: &str, field: &str, details: String) -> ValidationError {
    ValidationError::MissingField {
        file: file.to_string(),
        field: field.to_string(),
        details,
    }
}

fn apply_metadata(body: &Value, result: &mut ValidationResult) {
    let Some(metadata) = body.get("metadata") else {
        return;
    };

    if let Some(name) = metadata.get("name").and_then(Value::as_str) {
        result.resource_name = name.to_string();
    } else if let Some(prefix) = metadata.get("generateName").and_then(Value::as_str) {
        result.resource_name = format!("{}{{{{ generateName }}}}", prefix);
        result.name_is_generated = true;
    }

    if let Some(namespace) = metadata.get("namespace").and_then(Value::as_str) {
        result.resource_namespace = namespace.to_string();
    }
}
