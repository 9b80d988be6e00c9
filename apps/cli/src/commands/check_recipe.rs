//! Early `--recipe=` spelling check over raw training arguments.

use armature_recipe::validate_recipe_cli_args;
use colored::Colorize;

pub fn execute(args: &[String]) -> anyhow::Result<()> {
    validate_recipe_cli_args(args)?;

    let recipe = args.iter().rev().find_map(|arg| arg.strip_prefix("--recipe="));
    match recipe {
        Some(recipe) => println!("{} recipe `{}` is valid", "✓".green(), recipe),
        None => println!("{} no recipe selected", "✓".green()),
    }
    Ok(())
}
