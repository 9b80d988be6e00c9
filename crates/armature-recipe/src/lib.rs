//! Armature Recipe
//!
//! Recipe configuration and identity for distributed policy training:
//! - Resolving a run configuration from a file plus `--key=value` overrides
//! - Validating recipe-specific rules (`ValidationError` names field, value, fix)
//! - Deriving a stable identity (normalized config path + canonical SHA-256)
//! - Snapshotting that identity once per process (`PreflightContext`)

pub mod config;
pub mod error;
pub mod identity;
pub mod overrides;
pub mod preflight;
pub mod resolve;
pub mod routing;
pub mod validate;

pub use config::{
    CanonicalName, DatasetConfig, EnumOrString, EnvConfig, PirlConfig, PirlFlowNoiseConfig, PirlFlowSdeConfig,
    PirlVariant, PolicyConfig, Recipe, TrainPipelineConfig, TRAIN_CONFIG_NAME,
};
pub use error::{FieldValue, RecipeError, RecipeResult, ValidationError};
pub use identity::{
    canonical_json, compute_config_hash, digest_value, normalize_config_path, ConfigHash, ConfigPath,
    INLINE_CONFIG_PATH,
};
pub use overrides::{apply_override, parse_override, CliOverride};
pub use preflight::{log_preflight_summary, run_preflight, run_preflight_at, Preflight, PreflightContext, Role};
pub use resolve::{resolve_config, ConfigSource, ResolvedConfig};
pub use routing::{require_offline_route, TrainRoute};
pub use validate::{check_recipe_spelling, validate_recipe, validate_recipe_cli_args, ValidatedConfig, POLICY_UNSET};
