//! Hash command implementation.

use super::ConfigArgs;

/// Print only the config hash, for use in scripts.
pub fn execute(config: ConfigArgs) -> anyhow::Result<()> {
    let preflight = config.load()?;
    println!("{}", preflight.context.config_hash());
    Ok(())
}
