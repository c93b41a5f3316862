//! End-to-end runs of the `grantline` binary over a temporary data directory

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn grantline(data_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_grantline"))
        .arg("--data-dir")
        .arg(data_dir)
        .args(["--log-level", "error"])
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run grantline")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_group_lifecycle_persists_between_runs() {
    let dir = TempDir::new().unwrap();

    let created = grantline(dir.path(), &["creategroup", "mod"]);
    assert!(created.status.success());
    assert!(stdout(&created).contains("mod was created."));
    assert!(dir.path().join("groups").join("mod.json").exists());

    let again = grantline(dir.path(), &["creategroup", "mod"]);
    assert!(!again.status.success());
    assert!(stdout(&again).contains("mod already exists."));

    let listed = grantline(dir.path(), &["complete", "groups"]);
    let names: Vec<_> = stdout(&listed).lines().map(str::to_string).collect();
    assert!(names.contains(&"default".to_string()));
    assert!(names.contains(&"mod".to_string()));

    let deleted = grantline(dir.path(), &["deletegroup", "mod"]);
    assert!(deleted.status.success());
    assert!(!dir.path().join("groups").join("mod.json").exists());
}

#[test]
fn test_default_group_cannot_be_deleted() {
    let dir = TempDir::new().unwrap();
    let output = grantline(dir.path(), &["deletegroup", "default"]);
    assert!(!output.status.success());
    assert!(stdout(&output).contains("cannot be deleted"));
}

#[test]
fn test_user_promotion_and_check() {
    let dir = TempDir::new().unwrap();

    assert!(grantline(dir.path(), &["adduser", "Luck"]).status.success());
    for group in ["helper", "mod"] {
        assert!(grantline(dir.path(), &["creategroup", group]).status.success());
    }
    assert!(grantline(dir.path(), &["createtrack", "staff"]).status.success());
    for group in ["helper", "mod"] {
        assert!(grantline(dir.path(), &["track", "staff", "append", group])
            .status
            .success());
    }
    assert!(grantline(dir.path(), &["group", "mod", "set", "chat.mute", "true"])
        .status
        .success());

    let first = grantline(dir.path(), &["user", "Luck", "promote", "staff"]);
    assert!(stdout(&first).contains("Added Luck to helper on track staff."));
    let second = grantline(dir.path(), &["user", "luck", "promote", "staff"]);
    assert!(stdout(&second).contains("from helper to mod"));

    let check = grantline(dir.path(), &["user", "Luck", "check", "chat.mute"]);
    assert!(check.status.success());
    assert!(stdout(&check).contains("Luck has chat.mute set to true."));

    let top = grantline(dir.path(), &["user", "Luck", "promote", "staff"]);
    assert!(!top.status.success());
    assert!(stdout(&top).contains("already at the top"));
}

#[test]
fn test_unknown_user_fails() {
    let dir = TempDir::new().unwrap();
    let output = grantline(dir.path(), &["user", "Nobody", "addgroup", "default"]);
    assert!(!output.status.success());
    assert!(stdout(&output).contains("User Nobody could not be found."));
}
