//! Integration tests for `armature sync`.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_config(dir: &Path, output_dir: &Path) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let config = json!({
        "recipe": "pi-rl",
        "policy": { "type": "xvla" },
        "output_dir": output_dir,
        "pirl": {
            "variant": "flow-sde",
            "temperature": 0.7,
            "target_noise_scale": 0.2,
            "flow_sde": { "sigma_min": 0.01, "sigma_max": 0.2 }
        }
    });
    let path = dir.join("train_config.json");
    fs::write(&path, config.to_string()).unwrap();
    path
}

fn armature() -> Command {
    let mut cmd = Command::cargo_bin("armature").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_sync_same_config_is_verified() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_config(temp_dir.path(), &temp_dir.path().join("outputs"));

    let output = armature().arg("sync").arg("--learner-config").arg(&path).arg("--json").output().unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let out: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(out["verification"], "verified");
    assert_eq!(out["parameters_loaded"], 2);
    assert_eq!(out["learner_config_hash"], out["actor_config_hash"]);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("[learner] recipe preflight"), "{stderr}");
    assert!(stderr.contains("[actor] recipe preflight"), "{stderr}");
}

#[test]
fn test_sync_default_output_dir_is_shared() {
    let temp_dir = TempDir::new().unwrap();

    let output = armature()
        .current_dir(temp_dir.path())
        .arg("sync")
        .arg("--learner-override=--policy.type=sac")
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let out: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(out["verification"], "verified");
    assert_eq!(out["learner_config_path"], "<inline>");
    assert_eq!(out["learner_config_hash"], out["actor_config_hash"]);
}

#[test]
fn test_sync_actor_override_is_a_mismatch() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_config(temp_dir.path(), &temp_dir.path().join("outputs"));

    armature()
        .arg("sync")
        .arg("--learner-config")
        .arg(&path)
        .arg("--actor-override=--pirl.temperature=0.9")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Actor/Learner config mismatch"))
        .stderr(predicate::str::contains("Start the actor with the same config file as the learner."));
}

#[test]
fn test_sync_copied_config_reports_both_paths() {
    let temp_dir = TempDir::new().unwrap();
    let outputs = temp_dir.path().join("outputs");
    let learner = write_config(&temp_dir.path().join("learner"), &outputs);
    let actor = write_config(&temp_dir.path().join("actor"), &outputs);
    let learner_norm = fs::canonicalize(&learner).unwrap();
    let actor_norm = fs::canonicalize(&actor).unwrap();

    armature()
        .arg("sync")
        .arg("--learner-config")
        .arg(&learner)
        .arg("--actor-config")
        .arg(&actor)
        .assert()
        .failure()
        .stderr(predicate::str::contains(format!("actor config_path={}", actor_norm.display())))
        .stderr(predicate::str::contains(format!("learner config_path={}", learner_norm.display())));
}

#[test]
fn test_sync_without_metadata_applies_unverified() {
    let temp_dir = TempDir::new().unwrap();
    let outputs = temp_dir.path().join("outputs");
    let learner = write_config(&temp_dir.path().join("learner"), &outputs);
    let actor = write_config(&temp_dir.path().join("actor"), &outputs);

    armature()
        .arg("sync")
        .arg("--learner-config")
        .arg(&learner)
        .arg("--actor-config")
        .arg(&actor)
        .arg("--no-config-metadata")
        .assert()
        .success()
        .stdout(predicate::str::contains("Actor applied learner update (unverified)"));
}

#[test]
fn test_sync_invalid_actor_config_fails_preflight() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_config(temp_dir.path(), &temp_dir.path().join("outputs"));

    armature()
        .arg("sync")
        .arg("--learner-config")
        .arg(&path)
        .arg("--actor-override=--pirl.variant=flow_sde")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Actor preflight failed"))
        .stderr(predicate::str::contains("Invalid `pirl.variant` value 'flow_sde'"));
}
