//! End-to-end learner → actor rounds with contexts built from real config files.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use armature_recipe::{resolve_config, run_preflight, PolicyConfig, PreflightContext, TrainPipelineConfig};
use armature_transport::{
    ParameterBroadcaster, ParameterInbox, ParameterPayload, PolicyParameters, TensorBuffer, TransportError,
    TransportResult, Verification,
};
use tempfile::TempDir;

fn pirl_config(output_dir: &Path, temperature: f64) -> TrainPipelineConfig {
    let mut config = TrainPipelineConfig::default();
    config.recipe = Some("pi-rl".into());
    config.policy = Some(PolicyConfig::new("xvla"));
    config.output_dir = Some(output_dir.to_path_buf());
    config.pirl.variant = Some("flow-noise".into());
    config.pirl.temperature = Some(temperature);
    config.pirl.target_noise_scale = Some(0.3);
    config.pirl.flow_noise.std = Some(0.1);
    config
}

fn write_config(dir: &Path, config: &TrainPipelineConfig) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    config.save_to_dir(dir).unwrap()
}

fn context_for(path: &Path, overrides: &[&str]) -> Arc<PreflightContext> {
    let overrides: Vec<String> = overrides.iter().map(|s| (*s).to_string()).collect();
    let resolved = resolve_config(Some(path), &overrides).unwrap();
    Arc::new(run_preflight(resolved).unwrap().context)
}

fn weights() -> ParameterPayload {
    let mut payload = ParameterPayload::new();
    payload.insert("actor.mlp.0.weight", TensorBuffer::from_f32(vec![2, 2], &[0.1, 0.2, 0.3, 0.4]).unwrap());
    payload.insert("actor.mlp.0.bias", TensorBuffer::from_f32(vec![2], &[0.0, 0.0]).unwrap());
    payload
}

#[derive(Default)]
struct Policy {
    updates: Vec<ParameterPayload>,
}

impl PolicyParameters for Policy {
    fn load_parameters(&mut self, parameters: ParameterPayload) -> TransportResult<()> {
        self.updates.push(parameters);
        Ok(())
    }
}

#[tokio::test]
async fn test_same_config_file_is_verified_and_applied() {
    let temp = TempDir::new().unwrap();
    let path = write_config(&temp.path().join("run"), &pirl_config(&temp.path().join("out"), 0.5));

    let learner_ctx = context_for(&path, &[]);
    let actor_ctx = context_for(&path, &[]);
    assert_eq!(learner_ctx.config_hash(), actor_ctx.config_hash());

    let mut learner = ParameterBroadcaster::new(learner_ctx, true);
    let mut inbox = ParameterInbox::new(learner.subscribe(2), actor_ctx).with_timeout(Duration::from_secs(5));
    let mut policy = Policy::default();

    learner.broadcast(weights()).await.unwrap();
    let verification = inbox.update_policy(&mut policy).await.unwrap();

    assert_eq!(verification, Some(Verification::Verified));
    assert_eq!(policy.updates, vec![weights()]);
}

#[tokio::test]
async fn test_actor_with_different_values_rejects_update() {
    let temp = TempDir::new().unwrap();
    let path = write_config(&temp.path().join("run"), &pirl_config(&temp.path().join("out"), 0.5));

    let learner_ctx = context_for(&path, &[]);
    let actor_ctx = context_for(&path, &["--pirl.temperature=0.9"]);

    let mut learner = ParameterBroadcaster::new(learner_ctx.clone(), true);
    let mut inbox = ParameterInbox::new(learner.subscribe(2), actor_ctx.clone());
    let mut policy = Policy::default();

    learner.broadcast(weights()).await.unwrap();
    let err = inbox.update_policy(&mut policy).await.unwrap_err();

    assert!(matches!(err, TransportError::ConsistencyMismatch { .. }));
    let message = err.to_string();
    for literal in [
        actor_ctx.config_path().as_str(),
        learner_ctx.config_path().as_str(),
        actor_ctx.config_hash().as_str(),
        learner_ctx.config_hash().as_str(),
    ] {
        assert!(message.contains(literal), "missing {literal} in {message}");
    }
    assert!(policy.updates.is_empty());
}

#[tokio::test]
async fn test_copied_config_in_other_directory_rejects_on_path() {
    let temp = TempDir::new().unwrap();
    let config = pirl_config(&temp.path().join("out"), 0.5);
    let learner_path = write_config(&temp.path().join("learner"), &config);
    let actor_path = write_config(&temp.path().join("actor"), &config);

    let learner_ctx = context_for(&learner_path, &[]);
    let actor_ctx = context_for(&actor_path, &[]);
    assert_eq!(learner_ctx.config_hash(), actor_ctx.config_hash());
    assert_ne!(learner_ctx.config_path(), actor_ctx.config_path());

    let mut learner = ParameterBroadcaster::new(learner_ctx, true);
    let mut inbox = ParameterInbox::new(learner.subscribe(1), actor_ctx);

    learner.broadcast(weights()).await.unwrap();
    assert!(matches!(inbox.next_update().await, Err(TransportError::ConsistencyMismatch { .. })));
}

#[tokio::test]
async fn test_untagged_learner_is_applied_without_check() {
    let temp = TempDir::new().unwrap();
    let learner_path = write_config(&temp.path().join("learner"), &pirl_config(&temp.path().join("out"), 0.5));
    let actor_path = write_config(&temp.path().join("actor"), &pirl_config(&temp.path().join("out"), 0.8));

    let mut learner = ParameterBroadcaster::new(context_for(&learner_path, &[]), false);
    let mut inbox = ParameterInbox::new(learner.subscribe(1), context_for(&actor_path, &[]));
    let mut policy = Policy::default();

    learner.broadcast(weights()).await.unwrap();
    assert_eq!(inbox.update_policy(&mut policy).await.unwrap(), Some(Verification::Unverified));
    assert_eq!(policy.updates.len(), 1);
}
