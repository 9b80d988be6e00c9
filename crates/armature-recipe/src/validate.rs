//! Recipe rules and full run validation.

use chrono::{DateTime, Local};
use std::ops::Deref;
use std::path::{Path, PathBuf};

use crate::config::{CanonicalName, PirlVariant, Recipe, TrainPipelineConfig, TRAIN_CONFIG_NAME};
use crate::error::{FieldValue, RecipeError, RecipeResult, ValidationError};
use crate::resolve::ConfigSource;

/// Placeholder policy type reported when no policy is configured.
pub const POLICY_UNSET: &str = "<unset>";

impl Recipe {
    /// Policy types the recipe accepts in its current rollout phase.
    pub fn allowed_policies(self) -> &'static [&'static str] {
        match self {
            Self::PiRl => &["xvla"],
        }
    }
}

/// Check `--recipe=` spelling only. First failure wins.
pub fn check_recipe_spelling(recipe: &str) -> Result<Recipe, ValidationError> {
    Recipe::from_canonical(recipe).ok_or_else(|| {
        ValidationError::new(
            "recipe",
            Some(recipe),
            "Use canonical `pi-rl` (example: `--recipe=pi-rl`) or omit `recipe` for default behavior.",
        )
    })
}

/// Early preflight over raw CLI arguments, before any file is read.
pub fn validate_recipe_cli_args(args: &[String]) -> Result<(), ValidationError> {
    for arg in args {
        if let Some(value) = arg.strip_prefix("--recipe=") {
            check_recipe_spelling(value)?;
        }
    }
    Ok(())
}

/// Validate the recipe-specific structure of `config`.
///
/// Rules run in a fixed order and the first violation is returned:
/// spelling, policy allow-list, variant presence, variant allow-list,
/// shared knobs, variant knobs.
pub fn validate_recipe(config: &TrainPipelineConfig) -> Result<(), ValidationError> {
    let Some(recipe) = config.recipe_name() else {
        return Ok(());
    };
    let recipe = check_recipe_spelling(recipe)?;

    let policy_type = config.policy_type().unwrap_or(POLICY_UNSET);
    let allowed = recipe.allowed_policies();
    if !allowed.contains(&policy_type) {
        return Err(ValidationError::new(
            "policy.type",
            Some(policy_type),
            format!(
                "Allowed policy types for `recipe={}` in phase 1: [{}].",
                recipe.canonical_name(),
                allowed.join(", ")
            ),
        ));
    }

    let variant = match config.variant_name() {
        None => {
            return Err(ValidationError::new(
                "pirl.variant",
                FieldValue::Missing,
                "Set `--pirl.variant=flow-noise` or `--pirl.variant=flow-sde` when `recipe=pi-rl`.",
            ));
        }
        Some(name) => PirlVariant::from_canonical(name).ok_or_else(|| {
            ValidationError::new(
                "pirl.variant",
                Some(name),
                format!("Expected one of {}.", PirlVariant::expected_list()),
            )
        })?,
    };

    require_positive("pirl.temperature", config.pirl.temperature)?;
    require_positive("pirl.target_noise_scale", config.pirl.target_noise_scale)?;

    match variant {
        PirlVariant::FlowNoise => {
            require_positive("pirl.flow_noise.std", config.pirl.flow_noise.std)?;
        }
        PirlVariant::FlowSde => {
            let sigma_min = require_positive("pirl.flow_sde.sigma_min", config.pirl.flow_sde.sigma_min)?;
            let sigma_max = require_positive("pirl.flow_sde.sigma_max", config.pirl.flow_sde.sigma_max)?;
            if sigma_max <= sigma_min {
                return Err(ValidationError::new(
                    "pirl.flow_sde.sigma_max",
                    Some(sigma_max),
                    "`pirl.flow_sde.sigma_max` must be greater than `pirl.flow_sde.sigma_min`.",
                ));
            }
        }
    }

    Ok(())
}

fn require_positive(field_path: &str, value: Option<f64>) -> Result<f64, ValidationError> {
    match value {
        None => Err(ValidationError::new(field_path, value, format!("Set `--{field_path}=<positive float>`."))),
        // NaN fails `> 0.0` and lands here too.
        Some(v) if !(v > 0.0 && v.is_finite()) => Err(ValidationError::new(
            field_path,
            value,
            format!("Expected a positive value for `{field_path}`. Set `--{field_path}=<positive float>`."),
        )),
        Some(v) => Ok(v),
    }
}

/// A configuration that passed validation and had its late-bound defaults
/// filled in. It only hands out shared references, so the hashed snapshot
/// cannot drift afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedConfig {
    config: TrainPipelineConfig,
}

impl ValidatedConfig {
    pub fn config(&self) -> &TrainPipelineConfig {
        &self.config
    }
}

impl Deref for ValidatedConfig {
    type Target = TrainPipelineConfig;

    fn deref(&self) -> &Self::Target {
        &self.config
    }
}

impl TrainPipelineConfig {
    /// Validate the run and bind `job_name`, `output_dir` and resume paths.
    pub fn validate(self, source: &ConfigSource) -> RecipeResult<ValidatedConfig> {
        self.validate_at(source, Local::now())
    }

    /// Same as [`TrainPipelineConfig::validate`] with an explicit clock for the
    /// default output directory name.
    pub fn validate_at(mut self, source: &ConfigSource, now: DateTime<Local>) -> RecipeResult<ValidatedConfig> {
        validate_recipe(&self)?;

        if self.resume {
            let config_path = source.path().ok_or_else(|| {
                RecipeError::ConfigResolution(format!(
                    "A config path is expected when resuming a run. Please specify path to {TRAIN_CONFIG_NAME}"
                ))
            })?;
            if !config_path.exists() {
                return Err(RecipeError::ConfigResolution(format!(
                    "config path {} is expected to be a local path. Resuming from the hub is not supported for now.",
                    config_path.display()
                )));
            }
            let policy_dir = config_path.parent().map(Path::to_path_buf).unwrap_or_default();
            if let Some(policy) = self.policy.as_mut() {
                policy.pretrained_path = Some(policy_dir.clone());
            }
            self.checkpoint_path = policy_dir.parent().map(Path::to_path_buf);
        }

        let Some(policy) = self.policy.as_ref() else {
            return Err(ValidationError::new(
                "policy",
                FieldValue::Missing,
                "Policy is not configured. Set `--policy.type=<type>` or add a `policy` section to the config file.",
            )
            .into());
        };

        if self.job_name.as_deref().is_none_or(str::is_empty) {
            self.job_name = Some(match &self.env {
                Some(env) => format!("{}_{}", env.env_type, policy.policy_type),
                None => policy.policy_type.clone(),
            });
        }

        if policy.push_to_hub && policy.repo_id.is_none() {
            return Err(ValidationError::new(
                "policy.repo_id",
                FieldValue::Missing,
                "Please specify `policy.repo_id` to push the model to the hub.",
            )
            .into());
        }

        if let Some(dir) = &self.output_dir {
            if !self.resume && dir.is_dir() {
                return Err(RecipeError::OutputDirExists(dir.clone()));
            }
        } else {
            let job_name = self.job_name.as_deref().unwrap_or_default();
            let train_dir = format!("{}/{}_{job_name}", now.format("%Y-%m-%d"), now.format("%H-%M-%S"));
            self.output_dir = Some(PathBuf::from("outputs/train").join(train_dir));
        }

        if self.use_rabc && self.rabc_progress_path.is_none() {
            self.rabc_progress_path = self.dataset.as_ref().map(|dataset| match &dataset.root {
                Some(root) => root.join("sarm_progress.parquet").to_string_lossy().into_owned(),
                None => format!("hf://datasets/{}/sarm_progress.parquet", dataset.repo_id),
            });
        }

        Ok(ValidatedConfig { config: self })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatasetConfig, EnvConfig, PolicyConfig};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn pi_rl(variant: &str) -> TrainPipelineConfig {
        let mut config = TrainPipelineConfig::default();
        config.recipe = Some("pi-rl".into());
        config.policy = Some(PolicyConfig::new("xvla"));
        config.pirl.variant = Some(variant.into());
        config.pirl.temperature = Some(0.7);
        config.pirl.target_noise_scale = Some(0.2);
        config
    }

    fn flow_noise() -> TrainPipelineConfig {
        let mut config = pi_rl("flow-noise");
        config.pirl.flow_noise.std = Some(0.1);
        config
    }

    fn flow_sde(sigma_min: f64, sigma_max: f64) -> TrainPipelineConfig {
        let mut config = pi_rl("flow-sde");
        config.pirl.flow_sde.sigma_min = Some(sigma_min);
        config.pirl.flow_sde.sigma_max = Some(sigma_max);
        config
    }

    fn message(config: &TrainPipelineConfig) -> String {
        validate_recipe(config).unwrap_err().to_string()
    }

    #[test]
    fn test_recipe_unset_accepts_any_policy_and_variant() {
        let mut config = TrainPipelineConfig::default();
        config.policy = Some(PolicyConfig::new("sac"));
        config.pirl.variant = Some("flow-foo".into());
        config.pirl.flow_sde.sigma_min = Some(-1.0);
        assert!(validate_recipe(&config).is_ok());
    }

    #[test]
    fn test_accepts_both_variants_with_required_knobs() {
        assert!(validate_recipe(&flow_noise()).is_ok());
        assert!(validate_recipe(&flow_sde(0.02, 0.2)).is_ok());
    }

    #[test]
    fn test_rejects_non_canonical_recipe_spelling() {
        for spelling in ["pi_rl", "PI_RL", "Pi-RL", "pirl"] {
            let mut config = flow_noise();
            config.recipe = Some(spelling.into());
            let msg = message(&config);
            assert!(msg.starts_with(&format!("Invalid `recipe` value '{spelling}'.")), "{msg}");
            assert!(msg.contains("canonical `pi-rl`"), "{msg}");
        }
    }

    #[test]
    fn test_rejects_policy_outside_allow_list() {
        let mut config = flow_noise();
        config.policy = Some(PolicyConfig::new("sac"));
        let msg = message(&config);
        assert!(msg.contains("Invalid `policy.type` value 'sac'"), "{msg}");
        assert!(msg.contains("[xvla]"), "{msg}");
    }

    #[test]
    fn test_missing_policy_reports_unset_sentinel() {
        let mut config = flow_noise();
        config.policy = None;
        assert!(message(&config).contains("'<unset>'"));
    }

    #[test]
    fn test_policy_rule_runs_before_variant_rule() {
        let mut config = pi_rl("flow-foo");
        config.policy = Some(PolicyConfig::new("sac"));
        assert_eq!(validate_recipe(&config).unwrap_err().field_path, "policy.type");
    }

    #[test]
    fn test_rejects_missing_variant_naming_both() {
        let mut config = flow_noise();
        config.pirl.variant = None;
        let msg = message(&config);
        assert!(msg.contains("Invalid `pirl.variant` value None"), "{msg}");
        assert!(msg.contains("flow-noise") && msg.contains("flow-sde"), "{msg}");
    }

    #[test]
    fn test_rejects_unknown_variant() {
        let msg = message(&pi_rl("flow-noisee"));
        assert!(msg.contains("Invalid `pirl.variant` value 'flow-noisee'"), "{msg}");
        assert!(msg.contains("['flow-noise', 'flow-sde']"), "{msg}");
    }

    #[test]
    fn test_shared_knobs_checked_before_variant_knobs() {
        let mut config = pi_rl("flow-noise");
        config.pirl.temperature = None;
        let err = validate_recipe(&config).unwrap_err();
        assert_eq!(err.field_path, "pirl.temperature");
        assert!(err.to_string().contains("positive float"));

        let mut config = flow_noise();
        config.pirl.target_noise_scale = Some(-0.5);
        let err = validate_recipe(&config).unwrap_err();
        assert_eq!(err.field_path, "pirl.target_noise_scale");
        assert!(err.to_string().contains("positive value"));
    }

    #[test]
    fn test_rejects_missing_flow_noise_std() {
        let msg = message(&pi_rl("flow-noise"));
        assert!(msg.contains("Invalid `pirl.flow_noise.std` value None"), "{msg}");
        assert!(msg.contains("positive float"), "{msg}");
    }

    #[test]
    fn test_rejects_non_positive_flow_noise_std() {
        for bad in [0.0, -0.1, f64::NAN] {
            let mut config = flow_noise();
            config.pirl.flow_noise.std = Some(bad);
            let msg = message(&config);
            assert!(msg.contains("Invalid `pirl.flow_noise.std` value"), "{msg}");
            assert!(msg.contains("positive value"), "{msg}");
        }
        let mut config = flow_noise();
        config.pirl.flow_noise.std = Some(0.0);
        assert!(message(&config).contains("value 0."));
    }

    #[test]
    fn test_rejects_flow_sde_bounds_out_of_order() {
        let msg = message(&flow_sde(0.3, 0.2));
        assert!(msg.contains("Invalid `pirl.flow_sde.sigma_max` value 0.2"), "{msg}");
        assert!(msg.contains("greater than"), "{msg}");

        let msg = message(&flow_sde(0.3, 0.3));
        assert!(msg.contains("Invalid `pirl.flow_sde.sigma_max` value 0.3"), "{msg}");
        assert!(msg.contains("greater than"), "{msg}");
    }

    #[test]
    fn test_rejects_non_positive_sigma_min_before_ordering() {
        let err = validate_recipe(&flow_sde(0.0, 0.2)).unwrap_err();
        assert_eq!(err.field_path, "pirl.flow_sde.sigma_min");
    }

    #[test]
    fn test_cli_args_preflight_rejects_non_canonical_spelling() {
        let args = vec!["--policy.type=xvla".to_string(), "--recipe=PI_RL".to_string()];
        let err = validate_recipe_cli_args(&args).unwrap_err();
        assert!(err.to_string().contains("Invalid `recipe` value 'PI_RL'"));
        assert!(err.to_string().contains("canonical `pi-rl`"));

        assert!(validate_recipe_cli_args(&["--recipe=pi-rl".to_string()]).is_ok());
        assert!(validate_recipe_cli_args(&[]).is_ok());
    }

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap()
    }

    #[test]
    fn test_validate_binds_job_name_and_output_dir() {
        let mut config = flow_noise();
        config.env = Some(EnvConfig::new("aloha"));

        let validated = config.validate_at(&ConfigSource::inline(), fixed_now()).unwrap();
        assert_eq!(validated.job_name.as_deref(), Some("aloha_xvla"));
        assert_eq!(
            validated.output_dir.as_deref(),
            Some(Path::new("outputs/train/2025-03-14/09-26-53_aloha_xvla"))
        );
    }

    #[test]
    fn test_validate_requires_policy() {
        let err = TrainPipelineConfig::default().validate(&ConfigSource::inline()).unwrap_err();
        assert!(err.to_string().contains("Policy is not configured"));
        assert!(err.to_string().contains("`--policy.type=<type>`"));
    }

    #[test]
    fn test_validate_rejects_existing_output_dir_without_resume() {
        let temp = TempDir::new().unwrap();
        let mut config = flow_noise();
        config.output_dir = Some(temp.path().to_path_buf());
        let err = config.validate(&ConfigSource::inline()).unwrap_err();
        assert!(matches!(err, RecipeError::OutputDirExists(_)));
    }

    #[test]
    fn test_resume_requires_config_path() {
        let mut config = flow_noise();
        config.resume = true;
        let err = config.validate(&ConfigSource::inline()).unwrap_err();
        assert!(matches!(err, RecipeError::ConfigResolution(_)));
        assert!(err.to_string().contains(TRAIN_CONFIG_NAME));
    }

    #[test]
    fn test_resume_rejects_non_local_path() {
        let mut config = flow_noise();
        config.resume = true;
        let err = config.validate(&ConfigSource::file("lerobot/remote-run/train_config.json")).unwrap_err();
        assert!(err.to_string().contains("Resuming from the hub is not supported"));
    }

    #[test]
    fn test_resume_binds_pretrained_and_checkpoint_paths() {
        let temp = TempDir::new().unwrap();
        let run_dir = temp.path().join("checkpoints").join("last").join("pretrained_model");
        let mut config = flow_noise();
        config.resume = true;
        config.output_dir = Some(temp.path().to_path_buf());
        let config_path = config.save_to_dir(&run_dir).unwrap();

        let validated = config.validate(&ConfigSource::file(&config_path)).unwrap();
        assert_eq!(validated.policy.as_ref().unwrap().pretrained_path.as_deref(), Some(run_dir.as_path()));
        assert_eq!(validated.checkpoint_path.as_deref(), run_dir.parent());
    }

    #[test]
    fn test_push_to_hub_requires_repo_id() {
        let mut config = flow_noise();
        config.policy.as_mut().unwrap().push_to_hub = true;
        let err = config.validate(&ConfigSource::inline()).unwrap_err();
        assert!(err.to_string().contains("`policy.repo_id`"));
    }

    #[test]
    fn test_rabc_progress_path_derived_from_dataset() {
        let mut config = flow_noise();
        config.use_rabc = true;
        config.dataset = Some(DatasetConfig { repo_id: "lerobot/pusht".to_string(), root: None });
        let validated = config.validate_at(&ConfigSource::inline(), fixed_now()).unwrap();
        assert_eq!(
            validated.rabc_progress_path.as_deref(),
            Some("hf://datasets/lerobot/pusht/sarm_progress.parquet")
        );
    }
}
