//! Configuration identity: normalized config path + canonical content hash.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::error::RecipeResult;
use crate::validate::ValidatedConfig;

/// Reserved config path for configurations with no backing file.
pub const INLINE_CONFIG_PATH: &str = "<inline>";

/// Normalized absolute config file path, or [`INLINE_CONFIG_PATH`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigPath(String);

impl ConfigPath {
    #[must_use]
    pub fn inline() -> Self {
        Self(INLINE_CONFIG_PATH.to_string())
    }

    /// Wrap a string that is already in normalized form (e.g. received from a peer).
    #[must_use]
    pub fn from_normalized(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_inline(&self) -> bool {
        self.0 == INLINE_CONFIG_PATH
    }
}

impl fmt::Display for ConfigPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lowercase hex SHA-256 of a canonical configuration serialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigHash(String);

impl ConfigHash {
    #[must_use]
    pub fn from_hex(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Normalize the path a configuration was loaded from.
///
/// `None` (and the sentinel itself) map to [`INLINE_CONFIG_PATH`]. Otherwise
/// `~` is expanded, the path is made absolute and cleaned, and the longest
/// existing prefix is resolved through symlinks. The result is a fixed point:
/// normalizing it again returns it unchanged.
pub fn normalize_config_path(path: Option<&Path>) -> ConfigPath {
    let Some(path) = path else {
        return ConfigPath::inline();
    };
    if path.as_os_str() == INLINE_CONFIG_PATH {
        return ConfigPath::inline();
    }

    let expanded = expand_home(path);
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        std::env::current_dir().map_or_else(|_| expanded.clone(), |cwd| cwd.join(&expanded))
    };

    let resolved = resolve_existing_prefix(&lexical_clean(&absolute));
    ConfigPath(resolved.to_string_lossy().into_owned())
}

fn expand_home(path: &Path) -> PathBuf {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => match dirs::home_dir() {
            Some(home) => home.join(components.as_path()),
            None => path.to_path_buf(),
        },
        _ => path.to_path_buf(),
    }
}

/// Drop `.` segments, fold `..` and trailing separators without touching the filesystem.
fn lexical_clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn resolve_existing_prefix(path: &Path) -> PathBuf {
    let mut missing: Vec<OsString> = Vec::new();
    let mut current = path;
    loop {
        if let Ok(resolved) = std::fs::canonicalize(current) {
            return missing.iter().rev().fold(resolved, |acc, name| acc.join(name));
        }
        match (current.parent(), current.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                current = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

/// Recursively rebuild `value` with every object's keys in sorted order.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key.as_str()]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        scalar => scalar.clone(),
    }
}

/// Compact canonical JSON: sorted keys, `,` and `:` separators, no whitespace.
pub fn canonical_json(value: &Value) -> RecipeResult<String> {
    Ok(serde_json::to_string(&canonicalize(value))?)
}

pub fn digest_value(value: &Value) -> RecipeResult<ConfigHash> {
    let canonical = canonical_json(value)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(ConfigHash(hex::encode(hasher.finalize())))
}

/// Hash the frozen post-validation snapshot of a configuration.
///
/// Every serialized field participates, including the late-bound
/// `job_name` and `output_dir`.
pub fn compute_config_hash(config: &ValidatedConfig) -> RecipeResult<ConfigHash> {
    digest_value(&serde_json::to_value(config.config())?)
}
