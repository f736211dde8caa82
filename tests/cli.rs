//! End-to-end tests for the `coffer` binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const PASSPHRASE: &str = "correct horse";

/// Cheap key derivation so each invocation stays fast
const TEST_SETTINGS: &str = r#"{"kdf":{"memory_cost":1024,"time_cost":1,"parallelism":1}}"#;

fn coffer(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("coffer").unwrap();
    cmd.env("COFFER_DATA_DIR", dir.path())
        .env("COFFER_PASSPHRASE", PASSPHRASE)
        .env_remove("COFFER_DATABASE")
        .env_remove("COFFER_LOG");
    cmd
}

fn setup() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("config.json"), TEST_SETTINGS).unwrap();
    coffer(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created database"));
    dir
}

fn setup_with_login() -> TempDir {
    let dir = setup();
    coffer(&dir)
        .args(["group", "create", "Work"])
        .assert()
        .success();
    coffer(&dir)
        .args([
            "entry", "add", "Email", "--group", "Work", "--username", "alice", "--password",
            "s3cret-pw", "--url", "https://mail.example.com",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created entry: Email"));
    dir
}

#[test]
fn test_init_twice() {
    let dir = setup();
    assert!(dir.path().join("data").join("vault.cdb").exists());

    coffer(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn test_commands_need_a_database() {
    let dir = TempDir::new().unwrap();
    coffer(&dir)
        .arg("tree")
        .assert()
        .failure()
        .stderr(predicate::str::contains("coffer init"));
}

#[test]
fn test_wrong_passphrase() {
    let dir = setup();
    coffer(&dir)
        .env("COFFER_PASSPHRASE", "wrong")
        .arg("tree")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Encryption error"));
}

#[test]
fn test_tree_shows_groups_and_entries() {
    let dir = setup_with_login();
    coffer(&dir)
        .arg("tree")
        .assert()
        .success()
        .stdout(predicate::str::contains("vault\n"))
        .stdout(predicate::str::contains("└── Work/"))
        .stdout(predicate::str::contains("Email [alice]"));
}

#[test]
fn test_duplicate_group_name_rejected() {
    let dir = setup_with_login();
    coffer(&dir)
        .args(["group", "create", "work"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    coffer(&dir)
        .args(["group", "create", "Email", "--parent", "Work"])
        .assert()
        .success();
}

#[test]
fn test_show_masks_unless_revealed() {
    let dir = setup_with_login();
    coffer(&dir)
        .args(["entry", "show", "Work/Email"])
        .assert()
        .success()
        .stdout(predicate::str::contains("alice"))
        .stdout(predicate::str::contains("********"))
        .stdout(predicate::str::contains("s3cret-pw").not());

    coffer(&dir)
        .args(["entry", "show", "Work/Email", "--reveal"])
        .assert()
        .success()
        .stdout(predicate::str::contains("s3cret-pw"));
}

#[test]
fn test_database_file_has_no_plaintext() {
    let dir = setup_with_login();
    let contents = std::fs::read_to_string(dir.path().join("data").join("vault.cdb")).unwrap();
    assert!(contents.contains("\"format\": \"coffer\"") || contents.contains("\"format\":\"coffer\""));
    assert!(!contents.contains("s3cret-pw"));
    assert!(!contents.contains("alice"));
}

#[test]
fn test_copy_follows_policy() {
    let dir = setup_with_login();
    coffer(&dir)
        .args(["entry", "copy", "Work/Email"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not allowed"));

    coffer(&dir)
        .args(["entry", "copy", "Work/Email", "--field", "UserName"])
        .assert()
        .success()
        .stdout("alice\n");

    coffer(&dir)
        .args(["config", "allow_copy_protected_fields", "true"])
        .assert()
        .success();
    coffer(&dir)
        .args(["entry", "copy", "Work/Email"])
        .assert()
        .success()
        .stdout("s3cret-pw\n");
}

#[test]
fn test_edit_keeps_history() {
    let dir = setup_with_login();
    coffer(&dir)
        .args(["entry", "edit", "Work/Email", "--password", "n3w-pw", "--field", "PIN=1234"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Updated entry: Email"));

    coffer(&dir)
        .args(["entry", "history", "Work/Email"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#1"))
        .stdout(predicate::str::contains("differs: Password"));

    coffer(&dir)
        .args(["entry", "edit", "Work/Email"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No changes"));
}

#[test]
fn test_delete_and_restore() {
    let dir = setup_with_login();
    coffer(&dir)
        .args(["entry", "delete", "Work/Email"])
        .assert()
        .success()
        .stdout(predicate::str::contains("recycle bin"));

    coffer(&dir)
        .args(["group", "list", "Recycle Bin"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Email"));
    coffer(&dir)
        .args(["search", "alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No matching entries"));

    coffer(&dir)
        .args(["entry", "restore", "Recycle Bin/Email"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Restored entry: Work/Email"));

    coffer(&dir)
        .args(["entry", "delete", "Work/Email", "--permanent"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted entry: Email"));
    coffer(&dir)
        .args(["entry", "show", "Work/Email"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_move_rejects_cycles() {
    let dir = setup_with_login();
    coffer(&dir)
        .args(["group", "create", "Inner", "--parent", "Work"])
        .assert()
        .success();
    coffer(&dir)
        .args(["group", "move", "Work", "Work/Inner"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cycle detected"));

    coffer(&dir)
        .args(["entry", "move", "Work/Email", "Work/Inner"])
        .assert()
        .success();
    coffer(&dir)
        .args(["search", "mail"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Work/Inner/Email  [alice]"));
}

#[test]
fn test_expiry() {
    let dir = setup_with_login();
    coffer(&dir)
        .args(["entry", "edit", "Work/Email", "--expires", "2001-02-03"])
        .assert()
        .success();
    coffer(&dir)
        .args(["entry", "show", "Work/Email"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Expires:   2001-02-03 (expired)"));

    coffer(&dir)
        .args(["entry", "edit", "Work/Email", "--expires", "2001-02-30"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid date"));
}

#[test]
fn test_change_passphrase() {
    let dir = setup_with_login();
    coffer(&dir)
        .env("COFFER_NEW_PASSPHRASE", "battery staple")
        .arg("passphrase")
        .assert()
        .success()
        .stdout(predicate::str::contains("Passphrase changed"));

    coffer(&dir).arg("tree").assert().failure();
    coffer(&dir)
        .env("COFFER_PASSPHRASE", "battery staple")
        .arg("tree")
        .assert()
        .success()
        .stdout(predicate::str::contains("Email"));
}

#[test]
fn test_log_and_backups() {
    let dir = setup_with_login();
    coffer(&dir)
        .arg("log")
        .assert()
        .success()
        .stdout(predicate::str::contains("CREATE Group"))
        .stdout(predicate::str::contains("CREATE Entry"))
        .stdout(predicate::str::contains("s3cret-pw").not());

    let backups = std::fs::read_dir(dir.path().join("backups")).unwrap().count();
    assert_eq!(backups, 2);
}

#[test]
fn test_config_rejects_unknown_key() {
    let dir = setup();
    coffer(&dir)
        .args(["config", "no_such_setting", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown setting"));

    coffer(&dir)
        .args(["config", "history_max_items"])
        .assert()
        .success()
        .stdout("history_max_items = 10\n");
}
