//! Per-process recipe preflight snapshot.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::error::RecipeResult;
use crate::identity::{compute_config_hash, normalize_config_path, ConfigHash, ConfigPath};
use crate::resolve::{ConfigSource, ResolvedConfig};
use crate::validate::{ValidatedConfig, POLICY_UNSET};

/// Process role in a distributed actor/learner run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Actor,
    Learner,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Actor => "actor",
            Self::Learner => "learner",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable identity of this process's configuration, built once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreflightContext {
    recipe: Option<String>,
    policy_type: String,
    variant: Option<String>,
    config_path: ConfigPath,
    config_hash: ConfigHash,
}

impl PreflightContext {
    #[must_use]
    pub fn new(
        recipe: Option<String>,
        policy_type: impl Into<String>,
        variant: Option<String>,
        config_path: ConfigPath,
        config_hash: ConfigHash,
    ) -> Self {
        Self { recipe, policy_type: policy_type.into(), variant, config_path, config_hash }
    }

    /// Snapshot a validated configuration and the path it was loaded from.
    pub fn build(config: &ValidatedConfig, source: &ConfigSource) -> RecipeResult<Self> {
        Ok(Self {
            recipe: config.recipe_name().map(str::to_string),
            policy_type: config.policy_type().unwrap_or(POLICY_UNSET).to_string(),
            variant: config.variant_name().map(str::to_string),
            config_path: normalize_config_path(source.path()),
            config_hash: compute_config_hash(config)?,
        })
    }

    pub fn recipe(&self) -> Option<&str> {
        self.recipe.as_deref()
    }

    pub fn policy_type(&self) -> &str {
        &self.policy_type
    }

    pub fn variant(&self) -> Option<&str> {
        self.variant.as_deref()
    }

    pub fn config_path(&self) -> &ConfigPath {
        &self.config_path
    }

    pub fn config_hash(&self) -> &ConfigHash {
        &self.config_hash
    }
}

/// Emit the one-line startup summary. Silent when no recipe is active.
pub fn log_preflight_summary(context: &PreflightContext, role: Role) {
    let Some(recipe) = context.recipe() else {
        return;
    };

    info!(
        role = %role,
        recipe = recipe,
        policy = context.policy_type(),
        variant = context.variant().unwrap_or("None"),
        config_path = %context.config_path(),
        config_hash = %context.config_hash(),
        "[{role}] recipe preflight"
    );
}

/// Output of a successful preflight: the frozen config and its identity.
#[derive(Debug, Clone)]
pub struct Preflight {
    pub config: ValidatedConfig,
    pub context: PreflightContext,
}

/// Validate a resolved configuration and derive its preflight context.
pub fn run_preflight(resolved: ResolvedConfig) -> RecipeResult<Preflight> {
    run_preflight_at(resolved, Local::now())
}

/// [`run_preflight`] with a fixed clock for the timestamped `output_dir` default.
///
/// Processes that must agree on a config identity share one `now`.
pub fn run_preflight_at(resolved: ResolvedConfig, now: DateTime<Local>) -> RecipeResult<Preflight> {
    let ResolvedConfig { config, source } = resolved;
    let config = config.validate_at(&source, now)?;
    let context = PreflightContext::build(&config, &source)?;
    Ok(Preflight { config, context })
}
