//! Smoke tests for the `serial_bridge` binary.
use serde_json::Value;
use std::io::Write;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

/// Write a minimal config so the run does not depend on the user's config dir.
fn config_file(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("serial_bridge.toml");
    std::fs::write(&path, "[bridge]\nmax_minors = 2\n\n[logging]\nlevel = \"warn\"\n").unwrap();
    path
}

fn run(args: &[&str], stdin: &str) -> Output {
    let dir = TempDir::new().unwrap();
    let config = config_file(&dir);

    let mut child = Command::new(env!("CARGO_BIN_EXE_serial_bridge"))
        .arg("--config")
        .arg(&config)
        .args(args)
        .env("RUST_LOG", "off")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to start binary");

    child
        .stdin
        .take()
        .expect("stdin available")
        .write_all(stdin.as_bytes())
        .unwrap();
    // stdin is dropped here, so the command loop sees EOF.

    child.wait_with_output().expect("binary exits")
}

#[test]
fn stdio_round_trip_between_two_handles() {
    let script = concat!(
        "{\"command\": \"open\", \"params\": {\"device\": \"ttyEmulatedPort1\"}}\n",
        "{\"command\": \"open\", \"params\": {\"device\": \"ttyExogenous1\"}}\n",
        "{\"command\": \"write\", \"params\": {\"handle\": 2, \"data\": \"READY\"}}\n",
        "{\"command\": \"read\", \"params\": {\"handle\": 1, \"timeout_ms\": 1000}}\n",
    );

    let output = run(&["stdio"], script);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let responses: Vec<Value> = String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).expect("one JSON object per line"))
        .collect();
    assert_eq!(responses.len(), 4);
    assert!(responses.iter().all(|r| r["status"] == "ok"), "{responses:?}");
    assert_eq!(responses[3]["data"], "READY\n");
}

#[test]
fn stdio_reports_unknown_device() {
    let output = run(
        &["stdio"],
        "{\"command\": \"open\", \"params\": {\"device\": \"ttyExogenous5\"}}\n",
    );
    let stdout = String::from_utf8(output.stdout).unwrap();
    let response: Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(response["error"]["type"], "NoSuchDevice");
}

#[test]
fn exchange_prints_every_line() {
    let output = run(
        &[
            "exchange",
            "--reader",
            "ttyEmulatedPort0",
            "--writer",
            "ttyExogenous0",
            "HOME",
            "MOVE 10",
        ],
        "",
    );
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(String::from_utf8(output.stdout).unwrap(), "HOME\nMOVE 10\n");
}

#[test]
fn info_lists_devices() {
    let output = run(&["info", "--json"], "");
    assert!(output.status.success());

    let info: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(info["bridge"]["max_minors"], 2);
    assert_eq!(info["endpoints"].as_array().unwrap().len(), 4);
    assert_eq!(info["endpoints"][3]["name"], "ttyExogenous1");
}
