//! Resolved training configuration.
//!
//! `TrainPipelineConfig` is the fully merged configuration (file + CLI
//! overrides) of one training run. Only the recipe-related fields carry rules
//! in this crate; the rest is plain data that still participates in the
//! configuration hash.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{RecipeError, RecipeResult};

/// File name used when a run's configuration is written next to its checkpoints.
pub const TRAIN_CONFIG_NAME: &str = "train_config.json";

/// A closed set of values that also has a canonical string spelling.
pub trait CanonicalName: Sized + Copy + 'static {
    const ALL: &'static [Self];

    fn canonical_name(self) -> &'static str;

    fn from_canonical(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|candidate| candidate.canonical_name() == value)
    }

    /// Canonical spellings rendered as `['a', 'b']` for error hints.
    fn expected_list() -> String {
        let quoted: Vec<String> = Self::ALL.iter().map(|v| format!("'{}'", v.canonical_name())).collect();
        format!("[{}]", quoted.join(", "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Recipe {
    #[serde(rename = "pi-rl")]
    PiRl,
}

impl CanonicalName for Recipe {
    const ALL: &'static [Self] = &[Self::PiRl];

    fn canonical_name(self) -> &'static str {
        match self {
            Self::PiRl => "pi-rl",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PirlVariant {
    #[serde(rename = "flow-noise")]
    FlowNoise,
    #[serde(rename = "flow-sde")]
    FlowSde,
}

impl CanonicalName for PirlVariant {
    const ALL: &'static [Self] = &[Self::FlowNoise, Self::FlowSde];

    fn canonical_name(self) -> &'static str {
        match self {
            Self::FlowNoise => "flow-noise",
            Self::FlowSde => "flow-sde",
        }
    }
}

/// A field that callers may fill with either the typed enum or a raw string.
///
/// Both forms serialize to the same string, so they hash identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnumOrString<T> {
    Typed(T),
    Raw(String),
}

impl<T: CanonicalName> EnumOrString<T> {
    /// Lowers either representation to its string form. Every comparison
    /// against canonical spellings goes through here.
    pub fn as_canonical_str(&self) -> &str {
        match self {
            Self::Typed(value) => value.canonical_name(),
            Self::Raw(raw) => raw.as_str(),
        }
    }

    /// The typed value, if the string form is an exact canonical spelling.
    pub fn resolve(&self) -> Option<T> {
        match self {
            Self::Typed(value) => Some(*value),
            Self::Raw(raw) => T::from_canonical(raw),
        }
    }
}

impl<T: CanonicalName> fmt::Display for EnumOrString<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_canonical_str())
    }
}

impl<T> From<&str> for EnumOrString<T> {
    fn from(value: &str) -> Self {
        Self::Raw(value.to_string())
    }
}

impl From<Recipe> for EnumOrString<Recipe> {
    fn from(value: Recipe) -> Self {
        Self::Typed(value)
    }
}

impl From<PirlVariant> for EnumOrString<PirlVariant> {
    fn from(value: PirlVariant) -> Self {
        Self::Typed(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PirlFlowNoiseConfig {
    pub std: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PirlFlowSdeConfig {
    pub sigma_min: Option<f64>,
    pub sigma_max: Option<f64>,
}

/// Knobs for the `pi-rl` recipe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PirlConfig {
    pub variant: Option<EnumOrString<PirlVariant>>,
    pub temperature: Option<f64>,
    pub target_noise_scale: Option<f64>,
    pub flow_noise: PirlFlowNoiseConfig,
    pub flow_sde: PirlFlowSdeConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatasetConfig {
    pub repo_id: String,
    pub root: Option<PathBuf>,
}

/// Environment section. Environment-specific options are kept opaque in `options`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvConfig {
    #[serde(rename = "type")]
    pub env_type: String,
    #[serde(flatten)]
    pub options: BTreeMap<String, serde_json::Value>,
}

impl EnvConfig {
    #[must_use]
    pub fn new(env_type: impl Into<String>) -> Self {
        Self { env_type: env_type.into(), options: BTreeMap::new() }
    }
}

/// Policy section. Policy-specific options are kept opaque in `options`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(rename = "type")]
    pub policy_type: String,
    #[serde(default)]
    pub pretrained_path: Option<PathBuf>,
    #[serde(default)]
    pub push_to_hub: bool,
    #[serde(default)]
    pub repo_id: Option<String>,
    #[serde(flatten)]
    pub options: BTreeMap<String, serde_json::Value>,
}

impl PolicyConfig {
    #[must_use]
    pub fn new(policy_type: impl Into<String>) -> Self {
        Self {
            policy_type: policy_type.into(),
            pretrained_path: None,
            push_to_hub: false,
            repo_id: None,
            options: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainPipelineConfig {
    pub dataset: Option<DatasetConfig>,
    pub env: Option<EnvConfig>,
    pub policy: Option<PolicyConfig>,
    /// Where run outputs go. Reusing a directory overwrites it unless `resume` is set.
    pub output_dir: Option<PathBuf>,
    pub job_name: Option<String>,
    pub resume: bool,
    pub seed: Option<u64>,
    pub num_workers: u32,
    pub batch_size: u32,
    pub steps: u64,
    pub eval_freq: u64,
    pub log_freq: u64,
    pub tolerance_s: f64,
    pub save_checkpoint: bool,
    pub save_freq: u64,
    pub use_policy_training_preset: bool,
    pub recipe: Option<EnumOrString<Recipe>>,
    pub pirl: PirlConfig,
    // Reward-aligned behavior cloning
    pub use_rabc: bool,
    pub rabc_progress_path: Option<String>,
    pub rabc_kappa: f64,
    pub rabc_epsilon: f64,
    pub rabc_head_mode: Option<String>,
    pub rename_map: BTreeMap<String, String>,
    /// Set during validation when resuming; never read from or written to files.
    #[serde(skip)]
    pub checkpoint_path: Option<PathBuf>,
}

impl Default for TrainPipelineConfig {
    fn default() -> Self {
        Self {
            dataset: None,
            env: None,
            policy: None,
            output_dir: None,
            job_name: None,
            resume: false,
            seed: Some(1000),
            num_workers: 4,
            batch_size: 8,
            steps: 100_000,
            eval_freq: 20_000,
            log_freq: 200,
            tolerance_s: 1e-4,
            save_checkpoint: true,
            save_freq: 20_000,
            use_policy_training_preset: true,
            recipe: None,
            pirl: PirlConfig::default(),
            use_rabc: false,
            rabc_progress_path: None,
            rabc_kappa: 0.01,
            rabc_epsilon: 1e-6,
            rabc_head_mode: Some("sparse".to_string()),
            rename_map: BTreeMap::new(),
            checkpoint_path: None,
        }
    }
}

impl TrainPipelineConfig {
    /// The recipe tag lowered to its string form, if set.
    pub fn recipe_name(&self) -> Option<&str> {
        self.recipe.as_ref().map(EnumOrString::as_canonical_str)
    }

    /// The `pirl.variant` tag lowered to its string form, if set.
    pub fn variant_name(&self) -> Option<&str> {
        self.pirl.variant.as_ref().map(EnumOrString::as_canonical_str)
    }

    pub fn policy_type(&self) -> Option<&str> {
        self.policy.as_ref().map(|policy| policy.policy_type.as_str())
    }

    /// A document with every optional field populated, used to tell which
    /// override targets are string-typed.
    pub(crate) fn type_template() -> RecipeResult<serde_json::Value> {
        let mut policy = PolicyConfig::new("");
        policy.pretrained_path = Some(PathBuf::new());
        policy.repo_id = Some(String::new());

        let template = Self {
            dataset: Some(DatasetConfig { repo_id: String::new(), root: Some(PathBuf::new()) }),
            env: Some(EnvConfig::new("")),
            policy: Some(policy),
            output_dir: Some(PathBuf::new()),
            job_name: Some(String::new()),
            seed: Some(0),
            recipe: Some("".into()),
            pirl: PirlConfig {
                variant: Some("".into()),
                temperature: Some(0.0),
                target_noise_scale: Some(0.0),
                flow_noise: PirlFlowNoiseConfig { std: Some(0.0) },
                flow_sde: PirlFlowSdeConfig { sigma_min: Some(0.0), sigma_max: Some(0.0) },
            },
            rabc_progress_path: Some(String::new()),
            rabc_head_mode: Some(String::new()),
            ..Self::default()
        };
        Ok(serde_json::to_value(template)?)
    }

    /// Write this configuration as `train_config.json` inside `dir`.
    pub fn save_to_dir(&self, dir: &Path) -> RecipeResult<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(TRAIN_CONFIG_NAME);
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }

    /// Load a configuration from a run directory or directly from a file.
    pub fn from_pretrained(path: &Path) -> RecipeResult<Self> {
        let file = if path.is_dir() { path.join(TRAIN_CONFIG_NAME) } else { path.to_path_buf() };
        if !file.is_file() {
            return Err(RecipeError::ConfigResolution(format!(
                "{TRAIN_CONFIG_NAME} not found at {}",
                file.display()
            )));
        }
        let bytes = std::fs::read(&file)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
