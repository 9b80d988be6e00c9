//! Which training entry point a configuration belongs to.

use crate::config::TrainPipelineConfig;
use crate::error::{RecipeError, RecipeResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainRoute {
    /// Single-process offline training on a dataset.
    Offline,
    /// Actor/learner runtime; required whenever a recipe is active.
    DistributedRl,
}

impl TrainRoute {
    pub fn for_config(config: &TrainPipelineConfig) -> Self {
        if config.recipe.is_some() { Self::DistributedRl } else { Self::Offline }
    }
}

/// Guard for the offline entry point.
pub fn require_offline_route(config: &TrainPipelineConfig) -> RecipeResult<()> {
    match (TrainRoute::for_config(config), config.recipe_name()) {
        (TrainRoute::DistributedRl, Some(recipe)) => {
            Err(RecipeError::RequiresDistributedRuntime { recipe: recipe.to_string() })
        }
        _ => Ok(()),
    }
}
