use std::{path::Path, process::Command};

fn merge_six(save_dir: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_merge-six"))
        .args(args)
        .arg("--save-dir")
        .arg(save_dir)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run merge-six")
}

#[test]
fn play_saves_a_session_that_inspect_reads_and_reset_removes() {
    let dir = tempfile::tempdir().expect("temp dir");

    let played = merge_six(dir.path(), &["play", "--turns", "6", "--quiet", "--seed", "11"]);
    assert!(played.status.success(), "play should succeed: {played:?}");
    let summary = String::from_utf8_lossy(&played.stdout);
    assert!(summary.contains("score"), "summary missing: {summary}");
    assert!(dir.path().join("merge-six.session.json").exists());

    let inspected = merge_six(dir.path(), &["inspect"]);
    assert!(inspected.status.success());
    let snapshot: serde_json::Value =
        serde_json::from_slice(&inspected.stdout).expect("inspect prints JSON");
    assert_eq!(snapshot["version"], 1);
    assert_eq!(snapshot["columns"], 5);
    assert!(snapshot["gridSnapshot"].is_array());

    let reset = merge_six(dir.path(), &["reset"]);
    assert!(reset.status.success());
    assert!(!dir.path().join("merge-six.session.json").exists());
}

#[test]
fn broken_config_is_reported() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = dir.path().join("broken.toml");
    std::fs::write(&config, "columns = \"wide\"").expect("write config");

    let output = Command::new(env!("CARGO_BIN_EXE_merge-six"))
        .args(["play", "--turns", "1", "--config"])
        .arg(&config)
        .arg("--save-dir")
        .arg(dir.path())
        .output()
        .expect("failed to run merge-six");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("parsing config"));
}

#[test]
fn zero_sized_board_is_raised_to_the_smallest_playable_one() {
    let dir = tempfile::tempdir().expect("temp dir");

    let played = merge_six(
        dir.path(),
        &["play", "--columns", "0", "--rows", "0", "--turns", "1", "--quiet"],
    );
    assert!(played.status.success(), "play should succeed: {played:?}");

    let inspected = merge_six(dir.path(), &["inspect"]);
    assert!(inspected.status.success());
    let snapshot: serde_json::Value =
        serde_json::from_slice(&inspected.stdout).expect("inspect prints JSON");
    assert_eq!(snapshot["columns"], 2);
    assert_eq!(snapshot["rows"], 2);
}
