//! Armature CLI - recipe preflight and actor/learner config checks
//!
//! This CLI provides an `armature` command for resolving and validating
//! training recipe configs, printing their identity, and dry-running the
//! learner → actor parameter handshake.

mod commands;

use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use commands::{check_recipe, hash, preflight, sync, ConfigArgs, RoleArg};

/// Armature - distributed policy training recipes
#[derive(Parser, Debug)]
#[command(
    name = "armature",
    author,
    version,
    about = "Armature - recipe preflight for distributed policy training",
    long_about = "Armature resolves a training config (file plus `--key=value` overrides), validates recipe rules,\nand derives the config identity that learner and actor processes must agree on."
)]
struct Args {
    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve and validate a config, then print its preflight context
    ///
    /// Emits the one-line recipe preflight log for the chosen role and prints
    /// recipe, policy, variant, config path and config hash.
    Preflight {
        #[command(flatten)]
        config: ConfigArgs,

        /// Role this process would run as
        #[arg(long, value_enum, default_value_t = RoleArg::Learner)]
        role: RoleArg,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the config hash of a resolved, validated config
    Hash {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Check `--recipe=` spelling in raw CLI arguments without loading a config
    CheckRecipe {
        /// Raw training arguments (e.g. `--recipe=pi-rl --policy.type=xvla`)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Run one in-process learner → actor update through the consistency gate
    ///
    /// Builds a preflight context for each side, broadcasts a handshake update from
    /// the learner and admits it on the actor. Fails on a config mismatch.
    Sync {
        /// Learner config file
        #[arg(long)]
        learner_config: Option<std::path::PathBuf>,

        /// Actor config file (defaults to the learner's; with no actor overrides either,
        /// the actor mirrors the learner's overrides too)
        #[arg(long)]
        actor_config: Option<std::path::PathBuf>,

        /// Learner override, e.g. `--learner-override=--pirl.temperature=0.5` (repeatable)
        #[arg(long = "learner-override", allow_hyphen_values = true)]
        learner_overrides: Vec<String>,

        /// Actor override, e.g. `--actor-override=--pirl.temperature=0.5` (repeatable)
        #[arg(long = "actor-override", allow_hyphen_values = true)]
        actor_overrides: Vec<String>,

        /// Send updates without config metadata (actor applies them unverified)
        #[arg(long)]
        no_config_metadata: bool,

        /// How long the actor waits for the update
        #[arg(long, default_value_t = 5000)]
        timeout_ms: u64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr so `--json` output on stdout stays parseable.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let command = if let Some(cmd) = args.command {
        cmd
    } else {
        Args::command().print_help()?;
        return Ok(());
    };

    match command {
        Command::Preflight { config, role, json } => {
            preflight::execute(config, role.into(), json)?;
        }
        Command::Hash { config } => {
            hash::execute(config)?;
        }
        Command::CheckRecipe { args } => {
            check_recipe::execute(&args)?;
        }
        Command::Sync {
            learner_config,
            actor_config,
            learner_overrides,
            actor_overrides,
            no_config_metadata,
            timeout_ms,
            json,
        } => {
            let options = sync::SyncOptions {
                learner_config,
                actor_config,
                learner_overrides,
                actor_overrides,
                include_config_metadata: !no_config_metadata,
                timeout: std::time::Duration::from_millis(timeout_ms),
            };
            sync::execute(options, json).await?;
        }
    }

    Ok(())
}
