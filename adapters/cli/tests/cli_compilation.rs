use std::process::Command;

#[test]
fn cli_compiles_without_warnings() {
    let status = Command::new(env!("CARGO"))
        .current_dir(env!("CARGO_MANIFEST_DIR"))
        .args(["check", "--quiet", "--bin", "merge-six"])
        .status()
        .expect("failed to invoke cargo check for merge-six CLI binary");

    assert!(status.success(), "cargo check --bin merge-six should succeed");
}

#[test]
fn help_lists_every_subcommand() {
    let output = Command::new(env!("CARGO_BIN_EXE_merge-six"))
        .arg("--help")
        .output()
        .expect("failed to run merge-six --help");

    assert!(output.status.success());
    let help = String::from_utf8_lossy(&output.stdout);
    for subcommand in ["play", "inspect", "reset"] {
        assert!(help.contains(subcommand), "{subcommand} missing from help: {help}");
    }
}

#[test]
fn play_help_documents_board_overrides() {
    let output = Command::new(env!("CARGO_BIN_EXE_merge-six"))
        .args(["play", "--help"])
        .output()
        .expect("failed to run merge-six play --help");

    assert!(output.status.success());
    let help = String::from_utf8_lossy(&output.stdout);
    for flag in ["--columns", "--rows", "--seed", "--turns", "--fresh", "--save-dir"] {
        assert!(help.contains(flag), "{flag} missing from play help: {help}");
    }
}
