mod common;

use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use common::{jpeg_bytes, transparent_png_bytes};
use predicates::prelude::*;
use std::process::Command as StdCommand;

fn img_convert(workspace: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("img-convert").unwrap();
    cmd.arg("--workspace").arg(workspace.child("ws").path());
    cmd
}

fn staged_inputs() -> TempDir {
    let temp = TempDir::new().unwrap();
    temp.child("in/photo.jpg")
        .write_binary(&jpeg_bytes(64, 48))
        .unwrap();
    temp.child("in/logo.png")
        .write_binary(&transparent_png_bytes(32, 32))
        .unwrap();
    temp.child("in/notes.txt").write_str("not an image").unwrap();
    temp
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("img-convert").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("convert"));
}

#[test]
fn test_subcommand_help() {
    for sub in ["upload", "analyze", "estimate", "convert", "status", "reset", "info"] {
        let mut cmd = Command::cargo_bin("img-convert").unwrap();
        cmd.args([sub, "--help"]);
        cmd.assert().success();
    }
}

#[test]
fn test_upload_requires_inputs() {
    let temp = TempDir::new().unwrap();
    img_convert(&temp).arg("upload").assert().failure();
}

#[test]
fn test_estimate_png_to_jpeg() {
    let mut cmd = Command::cargo_bin("img-convert").unwrap();
    cmd.args(["estimate", "--from", "png", "--to", "jpeg", "--size", "1000"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("80.0%"));
}

#[test]
fn test_estimate_rejects_gif_target() {
    let mut cmd = Command::cargo_bin("img-convert").unwrap();
    cmd.args(["estimate", "--from", "png", "--to", "gif", "--size", "1000"]);
    cmd.assert().failure();
}

#[test]
fn test_convert_without_uploads_fails() {
    let temp = TempDir::new().unwrap();
    img_convert(&temp)
        .args(["convert", "-f", "jpeg"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no files are pending"));
}

#[test]
fn test_info_reports_transparency() {
    let temp = staged_inputs();
    let mut cmd = Command::cargo_bin("img-convert").unwrap();
    cmd.arg("info").arg(temp.child("in/logo.png").path());
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("32x32"))
        .stdout(predicate::str::contains("Transparency: yes"));
}

#[test]
fn test_info_missing_file() {
    let mut cmd = Command::cargo_bin("img-convert").unwrap();
    cmd.args(["info", "does-not-exist.png"]);
    cmd.assert().failure();
}

#[test]
fn test_full_session_flow() {
    let temp = staged_inputs();

    img_convert(&temp)
        .arg("upload")
        .arg(temp.child("in").path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Uploaded 2 file(s)"));
    temp.child("ws/session.json")
        .assert(predicate::path::exists());

    let output = img_convert(&temp)
        .args(["analyze", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["per_file"].as_array().unwrap().len(), 2);

    let output = img_convert(&temp)
        .args(["--quiet", "convert", "-f", "png", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["processed_count"], 2);
    assert_eq!(report["error_count"], 0);
    assert_eq!(report["statistics"]["file_count"], 2);

    img_convert(&temp)
        .args(["status", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"pending\": []"));

    img_convert(&temp).arg("reset").assert().success();
    img_convert(&temp)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Pending: 0"))
        .stdout(predicate::str::contains("Converted: 0"));
}

#[test]
fn test_incremental_convert_by_id() {
    let temp = staged_inputs();
    img_convert(&temp)
        .arg("upload")
        .arg(temp.child("in/photo.jpg").path())
        .assert()
        .success();

    let output = img_convert(&temp).args(["status", "--json"]).output().unwrap();
    let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let id = status["session"]["pending"][0]["id"]
        .as_str()
        .unwrap()
        .to_string();

    img_convert(&temp)
        .args(["convert", "-f", "jpeg", "-q", "70", "--file-id", &id])
        .assert()
        .success();

    img_convert(&temp)
        .args(["convert", "-f", "jpeg", "--file-id", &id])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown file id"));
}

#[test]
fn test_concurrent_incremental_converts_keep_every_result() {
    let temp = staged_inputs();
    img_convert(&temp)
        .arg("upload")
        .arg(temp.child("in").path())
        .assert()
        .success();

    let output = img_convert(&temp).args(["status", "--json"]).output().unwrap();
    let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let ids: Vec<String> = status["session"]["pending"]
        .as_array()
        .unwrap()
        .iter()
        .map(|meta| meta["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids.len(), 2);

    let children: Vec<_> = ids
        .iter()
        .map(|id| {
            StdCommand::new(assert_cmd::cargo::cargo_bin("img-convert"))
                .arg("--workspace")
                .arg(temp.child("ws").path())
                .args(["--quiet", "convert", "-f", "jpeg", "--file-id", id])
                .spawn()
                .unwrap()
        })
        .collect();
    for mut child in children {
        assert!(child.wait().unwrap().success());
    }

    let output = img_convert(&temp).args(["status", "--json"]).output().unwrap();
    let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["session"]["pending"].as_array().unwrap().len(), 0);
    assert_eq!(status["session"]["converted"].as_array().unwrap().len(), 2);
    assert_eq!(status["statistics"]["file_count"], 2);
}
