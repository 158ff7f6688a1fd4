use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn hound(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("hound").unwrap();
    cmd.env("HOME", home.path())
        .env_remove("HOUND_LOG")
        .env_remove("HOUND_CONFIG");
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.output().unwrap();
    assert!(output.status.success(), "command failed: {output:?}");
    String::from_utf8(output.stdout).unwrap()
}

#[test]
fn plan_with_seed_is_deterministic() {
    let home = TempDir::new().unwrap();

    let first = stdout_of(hound(&home).args(["plan", "300", "--seed", "7", "--output", "json"]));
    let second = stdout_of(hound(&home).args(["plan", "5m", "--seed", "7", "--output", "json"]));
    assert_eq!(first, second);

    let plan: serde_json::Value = serde_json::from_str(&first).unwrap();
    let steps = plan["steps"].as_array().unwrap();
    assert_eq!(plan["target_sec"], 300);
    assert!((4..=5).contains(&(steps.len() - 1)));
    assert_eq!(steps.last().unwrap()["duration"], 300);
    assert_eq!(steps.last().unwrap()["warmup"], false);
}

#[test]
fn plan_pretty() {
    let home = TempDir::new().unwrap();

    hound(&home)
        .args(["plan", "90s"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Plan"))
        .stdout(predicate::str::contains("Target"));
}

#[test]
fn config_seed_applies() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("custom.yaml");
    std::fs::write(&config, "runtime:\n  plan_seed: 7\n").unwrap();

    let from_config = stdout_of(hound(&home).args([
        "plan",
        "300",
        "-o",
        "json",
        "--config",
        config.to_str().unwrap(),
    ]));
    let from_flag = stdout_of(hound(&home).args(["plan", "300", "--seed", "7", "-o", "json"]));
    assert_eq!(from_config, from_flag);
}

#[test]
fn invalid_target_fails() {
    let home = TempDir::new().unwrap();

    hound(&home)
        .args(["plan", "0"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("invalid duration"));

    hound(&home)
        .args(["train", "soon", "--no-save"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a duration"));
}

#[test]
fn stats_on_empty_home() {
    let home = TempDir::new().unwrap();

    let output = stdout_of(hound(&home).args(["stats", "-o", "json"]));
    let value: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(value["stats"]["total_sessions"], 0);
    assert_eq!(value["stats"]["success_rate"], 0.0);

    assert!(home.path().join(".hound").join("hound.db").exists());
}

#[test]
fn history_on_empty_home() {
    let home = TempDir::new().unwrap();

    hound(&home)
        .args(["history", "--user", "alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("alice (0 sessions)"));
}

#[test]
fn train_quit_abandons_without_saving() {
    let home = TempDir::new().unwrap();

    hound(&home)
        .args(["train", "60", "--user", "alice", "-o", "json"])
        .write_stdin("q\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"abandoned\""));

    let output = stdout_of(hound(&home).args(["history", "--user", "alice", "-o", "json"]));
    let value: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(value["count"], 0);
}

#[test]
fn completions_bash() {
    let home = TempDir::new().unwrap();

    hound(&home)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hound"));
}
