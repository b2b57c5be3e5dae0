//! Integration tests for the `htp1` CLI binary.
//!
//! Argument parsing, help output, completions and error exit codes run
//! without a receiver; the end-to-end cases talk to a scripted in-process
//! WebSocket peer.
#![allow(clippy::unwrap_used)]

use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::{self, Message};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `htp1` binary with env isolation.
///
/// Clears all `HTP1_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn htp1_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("htp1");
    cmd.env("HOME", "/tmp/htp1-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/htp1-cli-test-nonexistent")
        .env_remove("HTP1_DEVICE")
        .env_remove("HTP1_HOST")
        .env_remove("HTP1_PORT")
        .env_remove("HTP1_TIMEOUT")
        .env_remove("HTP1_OUTPUT")
        .env_remove("HTP1_DEFAULT_DEVICE")
        .env_remove("RUST_LOG");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

/// Blocking fake receiver: answers `getmso` with `doc` and reports every
/// other text frame it sees. Serves connections until the test exits.
fn spawn_receiver(doc: Value) -> (u16, mpsc::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { return };
            let Ok(mut ws) = tungstenite::accept(stream) else {
                continue;
            };
            while let Ok(message) = ws.read() {
                match message {
                    Message::Text(text) if text.as_str() == "getmso" => {
                        let _ = ws.send(Message::text(format!("mso {doc}")));
                    }
                    Message::Text(text) => {
                        let _ = tx.send(text.as_str().to_owned());
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    (port, rx)
}

fn receiver_doc() -> Value {
    json!({
        "powerIsOn": true,
        "volume": -40,
        "muted": false,
        "cal": { "vpl": -80, "vph": 0 },
        "input": "h1",
        "inputs": {
            "h1": { "label": "Apple TV", "visible": true },
            "h2": { "label": "Blu-ray", "visible": true }
        },
        "upmix": {
            "select": "off",
            "off": { "homevis": true },
            "dts": { "homevis": true }
        }
    })
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = htp1_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    htp1_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("HTP-1")
            .and(predicate::str::contains("volume"))
            .and(predicate::str::contains("sound-mode"))
            .and(predicate::str::contains("watch")),
    );
}

#[test]
fn test_version_flag() {
    htp1_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("htp1"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    htp1_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    htp1_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_points_at_htp1_dir() {
    htp1_cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("htp1").and(predicate::str::contains("config.toml")));
}

#[test]
fn test_config_show_renders_defaults() {
    htp1_cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("port = 80").and(predicate::str::contains("timeout = 10")));
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let output = htp1_cmd().arg("foobar").output().unwrap();
    assert!(!output.status.success(), "Expected failure for invalid subcommand");
    let text = combined_output(&output);
    assert!(
        text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_no_device_configured() {
    let output = htp1_cmd().arg("state").output().unwrap();
    assert_eq!(output.status.code(), Some(4), "Expected config exit code");
    let text = combined_output(&output);
    assert!(text.contains("No receiver selected"), "Unexpected output:\n{text}");
}

#[test]
fn test_unknown_device_profile() {
    let output = htp1_cmd().args(["--device", "den", "probe"]).output().unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("'den' not found"));
}

#[test]
fn test_empty_host_rejected() {
    let output = htp1_cmd().args(["--host", " ", "probe"]).output().unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("IP address is required"));
}

#[test]
fn test_volume_level_out_of_range() {
    let output = htp1_cmd()
        .args(["--host", "127.0.0.1", "volume", "set", "1.5"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("between 0.0 and 1.0"));
}

#[test]
fn test_invalid_menu_key() {
    let output = htp1_cmd()
        .args(["--host", "127.0.0.1", "menu", "sideways"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_unreachable_receiver() {
    // Bind then drop to get a port nothing listens on.
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let output = htp1_cmd()
        .args(["--host", "127.0.0.1", "--port", &port.to_string(), "--timeout", "2", "probe"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3), "{}", combined_output(&output));
    assert!(combined_output(&output).contains("Could not connect"));
}

// ── Against a receiver ──────────────────────────────────────────────

#[test]
fn test_state_json() {
    let (port, _frames) = spawn_receiver(receiver_doc());
    let output = htp1_cmd()
        .args(["--host", "127.0.0.1", "--port", &port.to_string(), "-o", "json", "state"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let state: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(state["power"], json!(true));
    assert_eq!(state["volume"], json!(0.5));
    assert_eq!(state["source"], json!("Apple TV"));
    assert_eq!(state["sound_mode"], json!("DIRECT"));
}

#[test]
fn test_state_single_key() {
    let (port, _frames) = spawn_receiver(receiver_doc());
    htp1_cmd()
        .args(["--host", "127.0.0.1", "--port", &port.to_string(), "state", "source_list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Apple TV, Blu-ray"));
}

#[test]
fn test_action_reaches_receiver() {
    let (port, frames) = spawn_receiver(receiver_doc());
    htp1_cmd()
        .args(["--host", "127.0.0.1", "--port", &port.to_string(), "source", "Blu-ray"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Input change requested"));

    let frame = frames.recv_timeout(Duration::from_secs(5)).unwrap();
    let payload: Value = serde_json::from_str(frame.strip_prefix("changemso ").unwrap()).unwrap();
    assert_eq!(payload, json!([{ "op": "replace", "path": "/input", "value": "h2" }]));
}

#[test]
fn test_unknown_sound_mode_lists_choices() {
    let (port, frames) = spawn_receiver(receiver_doc());
    let output = htp1_cmd()
        .args(["--host", "127.0.0.1", "--port", &port.to_string(), "sound-mode", "STEREO"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(text.contains("DIRECT, DTS NEURAL:X"), "Unexpected output:\n{text}");
    assert!(frames.try_recv().is_err(), "nothing should have been sent");
}
