//! In-process learner → actor sync check.
//!
//! Both sides build their preflight context exactly as a real run would, then
//! a single handshake update travels over a bounded channel and through the
//! actor's consistency gate.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use armature_recipe::{log_preflight_summary, Role};
use armature_transport::{
    ParameterBroadcaster, ParameterInbox, ParameterPayload, PolicyParameters, TensorBuffer, TransportResult,
    Verification,
};
use chrono::Local;
use colored::Colorize;
use serde::Serialize;
use tracing::info;

use super::load_preflight_at;

pub struct SyncOptions {
    pub learner_config: Option<PathBuf>,
    /// `None` with no actor overrides means the actor mirrors the learner.
    pub actor_config: Option<PathBuf>,
    pub learner_overrides: Vec<String>,
    pub actor_overrides: Vec<String>,
    pub include_config_metadata: bool,
    pub timeout: Duration,
}

#[derive(Serialize)]
struct JsonOutput {
    verification: &'static str,
    parameters_loaded: usize,
    learner_config_path: String,
    learner_config_hash: String,
    actor_config_path: String,
    actor_config_hash: String,
}

/// Stand-in for an actor policy: records what it was given.
#[derive(Default)]
struct CountingPolicy {
    loaded: usize,
}

impl PolicyParameters for CountingPolicy {
    fn load_parameters(&mut self, parameters: ParameterPayload) -> TransportResult<()> {
        self.loaded = parameters.len();
        Ok(())
    }
}

fn handshake_update() -> TransportResult<ParameterPayload> {
    let mut payload = ParameterPayload::new();
    payload.insert("handshake.weight", TensorBuffer::from_f32(vec![2, 2], &[1.0, 0.0, 0.0, 1.0])?);
    payload.insert("handshake.bias", TensorBuffer::from_f32(vec![2], &[0.0, 0.0])?);
    Ok(payload)
}

impl SyncOptions {
    /// Config file and overrides the actor starts from.
    fn actor_source(&self) -> (Option<&Path>, &[String]) {
        match (&self.actor_config, self.actor_overrides.is_empty()) {
            (None, true) => (self.learner_config.as_deref(), self.learner_overrides.as_slice()),
            (actor, _) => (actor.as_deref().or(self.learner_config.as_deref()), self.actor_overrides.as_slice()),
        }
    }
}

pub async fn execute(options: SyncOptions, json: bool) -> anyhow::Result<()> {
    // One clock for both sides so a timestamped default `output_dir` matches.
    let now = Local::now();
    let learner = load_preflight_at(options.learner_config.as_deref(), &options.learner_overrides, now)
        .context("Learner preflight failed")?;
    let (actor_config, actor_overrides) = options.actor_source();
    let actor = load_preflight_at(actor_config, actor_overrides, now).context("Actor preflight failed")?;
    log_preflight_summary(&learner.context, Role::Learner);
    log_preflight_summary(&actor.context, Role::Actor);

    let learner_ctx = Arc::new(learner.context);
    let actor_ctx = Arc::new(actor.context);

    let mut broadcaster = ParameterBroadcaster::new(learner_ctx.clone(), options.include_config_metadata);
    let mut inbox = ParameterInbox::new(broadcaster.subscribe(1), actor_ctx.clone()).with_timeout(options.timeout);

    let actor_task = tokio::spawn(async move {
        let mut policy = CountingPolicy::default();
        let verification = inbox.update_policy(&mut policy).await?;
        TransportResult::Ok((verification, policy.loaded))
    });

    broadcaster.broadcast(handshake_update()?).await?;
    let (verification, loaded) = actor_task.await.context("Actor task panicked")??;
    let Some(verification) = verification else {
        bail!("Actor received no parameter update within {} ms", options.timeout.as_millis());
    };

    let verification = match verification {
        Verification::Verified => "verified",
        Verification::Unverified => "unverified",
    };
    info!(verification, parameters = loaded, "Actor applied learner update");

    if json {
        let out = JsonOutput {
            verification,
            parameters_loaded: loaded,
            learner_config_path: learner_ctx.config_path().to_string(),
            learner_config_hash: learner_ctx.config_hash().to_string(),
            actor_config_path: actor_ctx.config_path().to_string(),
            actor_config_hash: actor_ctx.config_hash().to_string(),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!("{} Actor applied learner update ({})", "✓".green(), verification);
    println!("  {:<10} {} {}", "learner:", learner_ctx.config_path(), learner_ctx.config_hash().as_str().dimmed());
    println!("  {:<10} {} {}", "actor:", actor_ctx.config_path(), actor_ctx.config_hash().as_str().dimmed());
    println!();
    Ok(())
}
