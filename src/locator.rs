//! Schema reference construction.
//!
//! A reference has the shape
//! `{base}/{versionDir}-standalone{-strict}/{kind}{-version[-group]}.json`.
//! Everything here is a pure function of its arguments; the configuration is
//! passed in explicitly on every call.

use crate::config::{
    DEFAULT_SCHEMA_LOCATION, MASTER_VERSION, OPENSHIFT_SCHEMA_LOCATION, SchemaConfig,
};

/// Base location for the primary lookup.
///
/// Precedence: explicit override, then environment override, then the
/// OpenShift registry when that mode is on, then the upstream registry.
pub fn base_location(config: &SchemaConfig) -> &str {
    if let Some(location) = non_empty(config.schema_location.as_deref()) {
        return location;
    }
    if let Some(location) = non_empty(config.env_schema_location.as_deref()) {
        return location;
    }
    if config.openshift {
        OPENSHIFT_SCHEMA_LOCATION
    } else {
        DEFAULT_SCHEMA_LOCATION
    }
}

/// Reference of the schema for `kind`/`api_version` under the primary base location
pub fn locate(kind: &str, api_version: &str, config: &SchemaConfig) -> String {
    locate_at(base_location(config), kind, api_version, config)
}

/// Reference of the schema for `kind`/`api_version` under an arbitrary base location
pub fn locate_at(base: &str, kind: &str, api_version: &str, config: &SchemaConfig) -> String {
    let version_dir = if config.kubernetes_version == MASTER_VERSION {
        MASTER_VERSION.to_string()
    } else {
        format!("v{}", config.kubernetes_version)
    };
    let strict_suffix = if config.strict { "-strict" } else { "" };
    let kind_suffix = if config.openshift {
        String::new()
    } else {
        kind_suffix(api_version)
    };

    format!(
        "{}/{}-standalone{}/{}{}.json",
        base.trim_end_matches('/'),
        version_dir,
        strict_suffix,
        kind.to_lowercase(),
        kind_suffix
    )
}

/// Every reference to try, primary first, then each fallback in declared order
pub fn schema_locations(kind: &str, api_version: &str, config: &SchemaConfig) -> Vec<String> {
    std::iter::once(base_location(config))
        .chain(
            config
                .additional_schema_locations
                .iter()
                .map(String::as_str)
                .filter(|base| !base.is_empty()),
        )
        .map(|base| locate_at(base, kind, api_version, config))
        .collect()
}

/// `-{version}[-{group}]`, with the version cut at its first `.`
fn kind_suffix(api_version: &str) -> String {
    let (group, version) = match api_version.split_once('/') {
        Some((group, version)) => (Some(group), version),
        None => (None, api_version),
    };
    let version = version.split('.').next().unwrap_or(version);

    match group {
        Some(group) => format!("-{}-{}", version.to_lowercase(), group.to_lowercase()),
        None => format!("-{}", version.to_lowercase()),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
