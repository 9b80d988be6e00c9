//! Command implementations for the `armature` binary.

pub mod check_recipe;
pub mod hash;
pub mod preflight;
pub mod sync;

use std::path::{Path, PathBuf};

use anyhow::Context;
use armature_recipe::{resolve_config, run_preflight_at, validate_recipe_cli_args, Preflight, Role};
use chrono::{DateTime, Local};
use clap::{Args, ValueEnum};

/// Where a config comes from: an optional file plus dotted-path overrides.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Config file (.json or .toml) or a directory containing train_config.json
    #[arg(short, long = "config")]
    pub config_path: Option<PathBuf>,

    /// Overrides such as `--pirl.temperature=0.5` (must come last)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub overrides: Vec<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleArg {
    Actor,
    Learner,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Actor => Role::Actor,
            RoleArg::Learner => Role::Learner,
        }
    }
}

/// Resolve, validate and snapshot a config.
///
/// The recipe spelling in the overrides is checked first so a typo fails
/// before any file is read.
pub fn load_preflight(config_path: Option<&Path>, overrides: &[String]) -> anyhow::Result<Preflight> {
    load_preflight_at(config_path, overrides, Local::now())
}

/// [`load_preflight`] against a fixed clock.
pub fn load_preflight_at(
    config_path: Option<&Path>,
    overrides: &[String],
    now: DateTime<Local>,
) -> anyhow::Result<Preflight> {
    validate_recipe_cli_args(overrides)?;
    let resolved = resolve_config(config_path, overrides).with_context(|| match config_path {
        Some(path) => format!("Failed to resolve config from {}", path.display()),
        None => "Failed to resolve config from overrides".to_string(),
    })?;
    Ok(run_preflight_at(resolved, now)?)
}

impl ConfigArgs {
    pub fn load(&self) -> anyhow::Result<Preflight> {
        load_preflight(self.config_path.as_deref(), &self.overrides)
    }
}
