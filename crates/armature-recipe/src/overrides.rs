//! `--dotted.path=value` overrides merged on top of a config file.

use serde_json::{Map, Value};

use crate::error::{RecipeError, RecipeResult};

/// One parsed command-line override.
#[derive(Debug, Clone, PartialEq)]
pub struct CliOverride {
    pub path: Vec<String>,
    pub value: Value,
    /// The text after `=`, before any JSON interpretation.
    pub raw: String,
}

impl CliOverride {
    pub fn dotted_path(&self) -> String {
        self.path.join(".")
    }

    /// Re-type the value by its target field: where `template` holds a string
    /// at this path, the raw text is kept as a string (`--job_name=2024`).
    #[must_use]
    pub fn typed_by(mut self, template: &Value) -> Self {
        let target = self.path.iter().try_fold(template, |node, segment| node.get(segment));
        if matches!(target, Some(Value::String(_))) {
            self.value = Value::String(self.raw.clone());
        }
        self
    }
}

/// Parse `--a.b.c=value`. Values that parse as JSON keep their JSON type;
/// anything else is taken as a plain string.
pub fn parse_override(arg: &str) -> RecipeResult<CliOverride> {
    let invalid = |reason: &str| RecipeError::InvalidOverride { arg: arg.to_string(), reason: reason.to_string() };

    let body = arg.strip_prefix("--").ok_or_else(|| invalid("expected a leading `--`"))?;
    let (key, raw) = body.split_once('=').ok_or_else(|| invalid("expected `--key=value`"))?;

    let path: Vec<String> = key.split('.').map(str::to_string).collect();
    if path.iter().any(String::is_empty) {
        return Err(invalid("empty key segment"));
    }

    let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok(CliOverride { path, value, raw: raw.to_string() })
}

/// Merge an override into a JSON document, creating intermediate objects
/// where the path does not exist yet (or is `null`).
pub fn apply_override(root: &mut Value, item: &CliOverride) -> RecipeResult<()> {
    let Some((last, parents)) = item.path.split_last() else {
        return Ok(());
    };

    let mut node = root;
    for segment in parents {
        if node.is_null() {
            *node = Value::Object(Map::new());
        }
        let Value::Object(map) = node else {
            return Err(RecipeError::InvalidOverride {
                arg: item.dotted_path(),
                reason: format!("`{segment}` is nested under a non-object value"),
            });
        };
        node = map.entry(segment.clone()).or_insert(Value::Null);
    }

    if node.is_null() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => {
            map.insert(last.clone(), item.value.clone());
            Ok(())
        }
        _ => Err(RecipeError::InvalidOverride {
            arg: item.dotted_path(),
            reason: format!("cannot set `{last}` on a non-object value"),
        }),
    }
}
