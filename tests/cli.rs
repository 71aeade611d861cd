//! End-to-end tests of the `fuse` binary with stand-in collaborators

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const READY: &str = r#"cat > plan.json; echo '{"event":"ready"}'"#;

/// Project whose backend runs `script` through `sh -c`
fn project(script: &str, tasks: &[&str], extra: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let tasks: Vec<String> = tasks.iter().map(|t| format!("'{}'", t)).collect();
    let config = format!(
        r#"
[tasks]
commands = [{tasks}]

[backend]
program = "sh"
args = ["-c", '''{script}''']

[dev]
port = 0

{extra}
"#,
        tasks = tasks.join(", "),
    );
    fs::write(dir.path().join("fuse.toml"), config).unwrap();
    dir
}

/// Project whose supervisor records its arguments in `supervised.txt`
#[cfg(unix)]
fn supervised_project() -> TempDir {
    use std::os::unix::fs::PermissionsExt;

    let dir = project(READY, &[], "[supervisor]\nprogram = \"./nodemon.sh\"\n");
    let nodemon = dir.path().join("nodemon.sh");
    fs::write(&nodemon, "#!/bin/sh\nprintf '%s\\n' \"$@\" > supervised.txt\n").unwrap();

    let mut permissions = fs::metadata(&nodemon).unwrap().permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(&nodemon, permissions).unwrap();
    dir
}

fn fuse(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("fuse").unwrap();
    cmd.current_dir(dir)
        .env("NO_COLOR", "1")
        .env_remove("FUSE_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

/// The mode banner is printed once, before any phase output
fn assert_banner_first(stderr: &str, label: &str) {
    let banner = format!("Starting Fuse in {} mode...", label);
    assert_eq!(stderr.matches("Starting Fuse in").count(), 1, "{}", stderr);

    let banner_at = stderr.find(&banner).expect("mode banner missing");
    let tasks_at = stderr.find("Running global tasks...").expect("tasks banner missing");
    assert!(banner_at < tasks_at, "{}", stderr);
}

#[test]
fn test_help_lists_mode_flags() {
    Command::cargo_bin("fuse")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--dev"))
        .stdout(predicate::str::contains("--dev-configure"));
}

#[test]
fn test_production_build_succeeds() {
    let dir = project(
        r#"cat > plan.json; echo '{"event":"bundled","bundle":"app","size":2048}'; echo '{"event":"ready"}'"#,
        &[],
        "",
    );

    let output = fuse(dir.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Assets compilation + bundling completed."))
        .stderr(predicate::str::contains("./assets/js/app.min.js"))
        .get_output()
        .clone();
    assert_banner_first(&String::from_utf8_lossy(&output.stderr), "BUILD");

    let plan = fs::read_to_string(dir.path().join("plan.json")).unwrap();
    assert!(plan.contains("\"uglify\""));
    assert!(plan.contains("\"production\""));
}

#[test]
fn test_task_output_is_shown() {
    let dir = project(READY, &["echo vendor assets copied"], "");

    fuse(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("vendor assets copied"));
}

#[test]
fn test_build_error_exits_with_status_one() {
    let dir = project(
        r#"echo '{"event":"error","message":"Cannot resolve vue"}'; exit 1"#,
        &[],
        "",
    );

    fuse(dir.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Cannot resolve vue"))
        .stderr(predicate::str::contains("Assets compilation").not());
}

#[test]
fn test_failed_global_task_exits_with_status_one() {
    let dir = project(READY, &["exit 4"], "");

    fuse(dir.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Global tasks failed!"));

    assert!(!dir.path().join("plan.json").exists());
}

#[test]
fn test_missing_explicit_config_is_an_error() {
    let dir = project(READY, &[], "");

    fuse(dir.path())
        .args(["--config", "typo.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("typo.toml"));

    assert!(!dir.path().join("plan.json").exists());
}

#[cfg(unix)]
#[test]
fn test_dev_mode_hands_off_to_supervisor() {
    let dir = supervised_project();

    let output = fuse(dir.path()).arg("--dev").assert().success().get_output().clone();
    assert_banner_first(&String::from_utf8_lossy(&output.stderr), "DEVELOPER");

    let supervised = fs::read_to_string(dir.path().join("supervised.txt")).unwrap();
    assert!(supervised.contains("--exec\nnode server\n"));
    assert!(supervised.contains("--watch\nserver\n"));

    let plan = fs::read_to_string(dir.path().join("plan.json")).unwrap();
    assert!(!plan.contains("\"uglify\""));
}

#[cfg(unix)]
#[test]
fn test_dev_configure_mode_hands_off_to_wizard() {
    let dir = supervised_project();

    let output = fuse(dir.path()).arg("-c").assert().success().get_output().clone();
    assert_banner_first(
        &String::from_utf8_lossy(&output.stderr),
        "CONFIGURE DEVELOPER",
    );

    let supervised = fs::read_to_string(dir.path().join("supervised.txt")).unwrap();
    assert!(supervised.contains("--exec\nnode wiki configure\n"));
    assert!(supervised.contains("--watch\nserver/configure.js\n"));

    let plan: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("plan.json")).unwrap()).unwrap();
    assert_eq!(plan["mode"], "dev-configure");
    assert_eq!(plan["targets"][1]["watch"], true);
}
