//! End-to-end checks of the netlify-dev binary

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const USER_SETTINGS: &str =
    r#"{ "cliId": "3f0e8a4c-6f7b-4c39-9a55-1c2d3e4f5a6b", "telemetryDisabled": true }"#;

/// The binary with telemetry switched off and a throwaway settings dir
fn netlify_dev(config_home: &Path) -> Command {
    fs::write(config_home.join("config.json"), USER_SETTINGS).unwrap();

    let mut cmd = Command::cargo_bin("netlify-dev").unwrap();
    cmd.env("NETLIFY_CONFIG_HOME", config_home)
        .env("NETLIFY_TEST_TRACK_URL", "http://127.0.0.1:9/track")
        .env("NETLIFY_TEST_IDENTIFY_URL", "http://127.0.0.1:9/identify")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_commands() {
    let home = TempDir::new().unwrap();

    netlify_dev(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("dev"))
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("--telemetry-disable"));
}

#[test]
fn version_matches_package() {
    let home = TempDir::new().unwrap();

    netlify_dev(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn port_equal_to_target_port_fails() {
    let home = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();

    netlify_dev(home.path())
        .current_dir(project.path())
        .args(["dev", "--port", "4567", "--target-port", "4567"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "\"port\" and \"targetPort\" options cannot have same values",
        ));
}

#[test]
fn telemetry_flag_after_command_is_rejected() {
    let home = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();

    netlify_dev(home.path())
        .current_dir(project.path())
        .args(["dev", "--telemetry-disable", "--port", "4567", "--target-port", "4567"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--telemetry-disable"))
        .stderr(predicate::str::contains("telemetry has been disabled").not());

    assert_eq!(
        fs::read_to_string(home.path().join("config.json")).unwrap(),
        USER_SETTINGS
    );
}

#[test]
fn telemetry_flag_before_command_is_rejected() {
    let home = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();

    netlify_dev(home.path())
        .current_dir(project.path())
        .args(["--telemetry-enable", "dev"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "--telemetry-enable cannot be combined with the dev command",
        ));

    assert_eq!(
        fs::read_to_string(home.path().join("config.json")).unwrap(),
        USER_SETTINGS
    );
}

#[test]
fn custom_framework_requires_command_and_target_port() {
    let home = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    fs::write(
        project.path().join("netlify.toml"),
        "[dev]\nframework = \"#custom\"\ncommand = \"npm run dev\"\n",
    )
    .unwrap();

    netlify_dev(home.path())
        .current_dir(project.path())
        .arg("dev")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "\"command\" and \"targetPort\" properties are required",
        ));
}

#[test]
fn unknown_framework_fails() {
    let home = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();

    netlify_dev(home.path())
        .current_dir(project.path())
        .args(["dev", "--framework", "not-a-framework"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported value provided"));
}

#[cfg(unix)]
#[test]
fn serve_stops_on_build_error() {
    let home = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    fs::write(
        project.path().join("netlify.toml"),
        "[build]\ncommand = \"exit 2\"\npublish = \"dist\"\n",
    )
    .unwrap();
    fs::create_dir_all(project.path().join(".netlify/edge-functions")).unwrap();

    netlify_dev(home.path())
        .current_dir(project.path())
        .arg("serve")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Could not start local server due to a build error",
        ));

    assert!(!project.path().join(".netlify/edge-functions").exists());
    assert!(project.path().join(".netlify/netlify.toml").exists());
}

#[cfg(unix)]
#[test]
fn serve_does_not_warn_about_dev_server_settings() {
    let home = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    fs::write(
        project.path().join("netlify.toml"),
        "[build]\ncommand = \"exit 2\"\npublish = \"dist\"\n\n\
         [dev]\ncommand = \"npm run dev\"\ntargetPort = 5173\n",
    )
    .unwrap();

    netlify_dev(home.path())
        .current_dir(project.path())
        .arg("serve")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Ignoring").not())
        .stderr(predicate::str::contains("was set to").not())
        .stderr(predicate::str::contains(
            "Could not start local server due to a build error",
        ));
}
