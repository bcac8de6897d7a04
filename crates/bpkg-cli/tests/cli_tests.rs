//! End-to-end CLI tests: write a configuration manifest and a package
//! database to a temp directory and drive the built `bpkg` binary over them.

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;
use tempfile::TempDir;

fn bpkg() -> Command {
    Command::new(cargo_bin!("bpkg"))
}

fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    path
}

const CONFIG_TOML: &str = r#"
[[configurations]]
name = "target"
path = "/cfg/target"
type = "target"
"#;

const DB_TOML: &str = r#"
[[available]]
name = "libfoo"
version = "1.2.0"

[[selection]]
name = "libfoo"
version = "1.2.0"
config = "target"
"#;

#[test]
fn test_help_output() {
    bpkg()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Build plan"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("status"));
}

#[test]
fn test_version_output() {
    bpkg().arg("--version").assert().success().stdout(predicate::str::contains("bpkg"));
}

#[test]
fn test_plan_new_package_is_a_build_action() {
    let dir = TempDir::new().unwrap();
    let config = write(&dir, "config.toml", CONFIG_TOML);
    let db = write(&dir, "db.toml", DB_TOML);

    bpkg()
        .args(["plan", "--config"])
        .arg(&config)
        .arg("--db")
        .arg(&db)
        .assert()
        .success()
        .stdout(predicate::str::contains("libfoo"))
        .stdout(predicate::str::contains("checksum:"));
}

#[test]
fn test_status_reports_new_package() {
    let dir = TempDir::new().unwrap();
    let config = write(&dir, "config.toml", CONFIG_TOML);
    let db = write(&dir, "db.toml", DB_TOML);

    bpkg()
        .args(["status", "--config"])
        .arg(&config)
        .arg("--db")
        .arg(&db)
        .assert()
        .success()
        .stdout(predicate::str::contains("new at"));
}

#[test]
fn test_plan_missing_db_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let config = write(&dir, "config.toml", CONFIG_TOML);
    let missing = dir.path().join("does-not-exist.toml");

    bpkg()
        .args(["plan", "--config"])
        .arg(&config)
        .arg("--db")
        .arg(&missing)
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn test_status_unknown_configuration_reference_is_an_error() {
    let dir = TempDir::new().unwrap();
    let config = write(&dir, "config.toml", CONFIG_TOML);
    let db = write(
        &dir,
        "db.toml",
        r#"
        [[selection]]
        name = "libfoo"
        version = "1.0.0"
        config = "nonexistent"
        "#,
    );

    bpkg()
        .args(["status", "--config"])
        .arg(&config)
        .arg("--db")
        .arg(&db)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown configuration"));
}
