//! Config resolution: file + CLI overrides → `TrainPipelineConfig`.
//!
//! The resolution layer is the only place that knows where a configuration came
//! from. It hands that origin to the identity builder explicitly as a
//! [`ConfigSource`].

use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::{TrainPipelineConfig, TRAIN_CONFIG_NAME};
use crate::error::{RecipeError, RecipeResult};
use crate::overrides::{apply_override, parse_override};

/// Where a resolved configuration was loaded from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSource {
    path: Option<PathBuf>,
}

impl ConfigSource {
    /// A configuration assembled purely from CLI arguments or code.
    #[must_use]
    pub fn inline() -> Self {
        Self { path: None }
    }

    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self { path: Some(path.into()) }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// A merged configuration together with its origin.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: TrainPipelineConfig,
    pub source: ConfigSource,
}

impl ResolvedConfig {
    #[must_use]
    pub fn inline(config: TrainPipelineConfig) -> Self {
        Self { config, source: ConfigSource::inline() }
    }
}

/// Load `config_path` (a `.json`/`.toml` file or a run directory holding
/// `train_config.json`), apply `overrides`, and deserialize the result.
pub fn resolve_config(config_path: Option<&Path>, overrides: &[String]) -> RecipeResult<ResolvedConfig> {
    let (mut document, source) = match config_path {
        Some(path) => {
            let file = if path.is_dir() { path.join(TRAIN_CONFIG_NAME) } else { path.to_path_buf() };
            (read_document(&file)?, ConfigSource::file(file))
        }
        None => (serde_json::to_value(TrainPipelineConfig::default())?, ConfigSource::inline()),
    };

    let template = TrainPipelineConfig::type_template()?;
    for arg in overrides {
        let item = parse_override(arg)?.typed_by(&template);
        debug!(key = %item.dotted_path(), value = %item.value, "Applying config override");
        apply_override(&mut document, &item)?;
    }

    let config: TrainPipelineConfig = serde_json::from_value(document)?;
    Ok(ResolvedConfig { config, source })
}

fn read_document(path: &Path) -> RecipeResult<Value> {
    if !path.is_file() {
        return Err(RecipeError::ConfigResolution(format!("config file not found: {}", path.display())));
    }
    let content = std::fs::read_to_string(path)?;

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(serde_json::from_str(&content)?),
        Some("toml") => Ok(toml::from_str(&content)?),
        other => Err(RecipeError::ConfigResolution(format!(
            "unsupported config file extension {:?} for {} (expected .json or .toml)",
            other.unwrap_or(""),
            path.display()
        ))),
    }
}
