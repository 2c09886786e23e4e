use assert_cmd::prelude::*;
use predicates::str::contains;
use std::io::Write;
use std::process::Command;
use tempfile::{tempdir, NamedTempFile};

fn write_config(xml: &str) -> NamedTempFile {
    let mut tmp = NamedTempFile::new().expect("temp config");
    tmp.write_all(xml.as_bytes()).expect("write config");
    tmp
}

#[test]
fn headless_run_prints_summary_with_builtin_assets() {
    let missing = tempdir().expect("temp dir");
    let mut cmd = Command::cargo_bin("mirror-room").expect("binary exists");
    cmd.arg("--headless")
        .arg("--frames")
        .arg("2")
        .arg("--seed")
        .arg("3")
        .arg("--assets")
        .arg(missing.path().join("Data"));
    cmd.assert()
        .success()
        .stdout(contains("Rendered 2 frames"))
        .stdout(contains(" - lights: 2 point, 2 spot"))
        .stdout(contains(" - live device objects after teardown: 0"));
}

#[test]
fn config_file_sets_frame_count() {
    let config = write_config(
        r#"<viewer>
  <frames>4</frames>
  <seed>11</seed>
  <assets>/nonexistent/mirror-room-data</assets>
</viewer>
"#,
    );
    let mut cmd = Command::cargo_bin("mirror-room").expect("binary exists");
    cmd.arg("--headless").arg("--config").arg(config.path());
    cmd.assert().success().stdout(contains("Rendered 4 frames"));
}

#[test]
fn flags_override_config_file() {
    let config = write_config("<viewer><frames>4</frames></viewer>");
    let mut cmd = Command::cargo_bin("mirror-room").expect("binary exists");
    cmd.arg("--headless")
        .arg("--config")
        .arg(config.path())
        .arg("--frames")
        .arg("1")
        .arg("--assets")
        .arg("/nonexistent/mirror-room-data");
    cmd.assert().success().stdout(contains("Rendered 1 frames"));
}

#[test]
fn invalid_config_fails() {
    let config = write_config("<viewer><fps>0</fps></viewer>");
    let mut cmd = Command::cargo_bin("mirror-room").expect("binary exists");
    cmd.arg("--headless").arg("--config").arg(config.path());
    cmd.assert()
        .failure()
        .stderr(contains("failed to parse config"));
}

#[test]
fn unknown_flag_prints_usage() {
    let mut cmd = Command::cargo_bin("mirror-room").expect("binary exists");
    cmd.arg("--fullscreen");
    cmd.assert()
        .failure()
        .stderr(contains("Unknown argument: --fullscreen"))
        .stderr(contains("Usage: mirror-room"));
}
