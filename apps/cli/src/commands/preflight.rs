//! Preflight command implementation.

use armature_recipe::{log_preflight_summary, PreflightContext, Role, TrainRoute};
use colored::Colorize;
use serde::Serialize;

use super::ConfigArgs;

#[derive(Serialize)]
struct JsonOutput<'a> {
    role: &'a str,
    route: &'a str,
    #[serde(flatten)]
    context: &'a PreflightContext,
}

pub fn execute(config: ConfigArgs, role: Role, json: bool) -> anyhow::Result<()> {
    let preflight = config.load()?;
    log_preflight_summary(&preflight.context, role);

    let route = route_name(TrainRoute::for_config(&preflight.config));
    if json {
        let out = JsonOutput { role: role.as_str(), route, context: &preflight.context };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let context = &preflight.context;
    println!();
    println!("{}", format!("Recipe preflight ({role})").bold().cyan());
    println!();
    println!("  {:<12} {}", "recipe:", context.recipe().unwrap_or("None"));
    println!("  {:<12} {}", "policy:", context.policy_type());
    println!("  {:<12} {}", "variant:", context.variant().unwrap_or("None"));
    println!("  {:<12} {}", "route:", route);
    println!("  {:<12} {}", "config_path:", context.config_path());
    println!("  {:<12} {}", "config_hash:", context.config_hash().as_str().dimmed());
    println!();
    Ok(())
}

pub(crate) fn route_name(route: TrainRoute) -> &'static str {
    match route {
        TrainRoute::Offline => "offline",
        TrainRoute::DistributedRl => "distributed-rl",
    }
}
