//! CLI integration tests for the `stockwatch` subcommands.
//!
//! Uses `assert_cmd` to spawn the `stockwatch` binary and verify
//! exit codes, stdout content, and stderr content.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const ENV_KEYS: &[&str] = &[
    "STOCKWATCH_LOW_STOCK_THRESHOLD",
    "STOCKWATCH_ALERT_EMAIL_FROM",
    "STOCKWATCH_ALERT_EMAIL_TO",
    "STOCKWATCH_MAIL_RELAY_URL",
    "STOCKWATCH_MAIL_RELAY_KEY",
    "STOCKWATCH_SETUP_SECRET",
    "STOCKWATCH_STORE_NAME",
];

/// Helper: create a Command for the `stockwatch` binary with a clean environment.
fn stockwatch() -> Command {
    let mut cmd = cargo_bin_cmd!("stockwatch");
    for key in ENV_KEYS {
        cmd.env_remove(key);
    }
    cmd
}

fn write_config(dir: &TempDir, body: &str) -> String {
    let path = dir.path().join("stockwatch.toml");
    fs::write(&path, body).expect("write config");
    path.to_str().expect("utf-8 path").to_string()
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    stockwatch()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Inventory low-stock alerting and notification service",
        ));
}

#[test]
fn version_exits_0() {
    stockwatch()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("stockwatch"));
}

#[test]
fn evaluate_help_mentions_threshold() {
    stockwatch()
        .args(["evaluate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--threshold"));
}

// ──────────────────────────────────────────────
// 2. Evaluate subcommand
// ──────────────────────────────────────────────

#[test]
fn evaluate_downward_crossing() {
    stockwatch()
        .args(["evaluate", "--before", "10", "--after", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "crossing: inventory 3 is below threshold 5",
        ));
}

#[test]
fn evaluate_already_low_is_no_crossing() {
    stockwatch()
        .args(["evaluate", "--before", "3", "--after", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no crossing"));
}

#[test]
fn evaluate_exact_threshold_is_no_crossing() {
    stockwatch()
        .args(["evaluate", "--before", "10", "--after", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no crossing"));
}

#[test]
fn evaluate_new_product_created_low() {
    stockwatch()
        .args(["evaluate", "--after", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("crossing: inventory 0"));
}

#[test]
fn evaluate_deleted_product_is_no_crossing() {
    stockwatch()
        .args(["evaluate", "--before", "10", "--after", "absent"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no crossing"));
}

#[test]
fn evaluate_json_output() {
    let output = stockwatch()
        .args([
            "--output", "json", "evaluate", "--before", "10", "--after", "3",
        ])
        .output()
        .expect("run stockwatch");
    assert!(output.status.success());
    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(json["crossing"], true);
    assert_eq!(json["before"], 10);
    assert_eq!(json["after"], 3);
    assert_eq!(json["threshold"], 5);
}

#[test]
fn evaluate_threshold_flag_overrides_default() {
    stockwatch()
        .args([
            "evaluate",
            "--before",
            "30",
            "--after",
            "15",
            "--threshold",
            "20",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("below threshold 20"));
}

#[test]
fn evaluate_threshold_from_config_file() {
    let dir = TempDir::new().expect("temp dir");
    let config = write_config(&dir, "[pipeline]\nthreshold = 2\n");
    stockwatch()
        .args(["--config", &config, "evaluate", "--before", "10", "--after", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no crossing"));
}

#[test]
fn evaluate_threshold_from_environment() {
    stockwatch()
        .env("STOCKWATCH_LOW_STOCK_THRESHOLD", "50")
        .args(["evaluate", "--before", "60", "--after", "40"])
        .assert()
        .success()
        .stdout(predicate::str::contains("below threshold 50"));
}

#[test]
fn evaluate_non_integer_inventory_fails() {
    stockwatch()
        .args(["evaluate", "--before", "10", "--after", "lots"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid inventory"));
}

#[test]
fn evaluate_zero_threshold_fails() {
    stockwatch()
        .args(["evaluate", "--after", "1", "--threshold", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("threshold must be at least 1"));
}

// ──────────────────────────────────────────────
// 3. Render subcommand
// ──────────────────────────────────────────────

#[test]
fn render_text_prints_subject_and_body() {
    stockwatch()
        .args(["render", "--name", "Argan Oil", "--inventory", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Subject: Low stock: Argan Oil (3 left)"))
        .stdout(predicate::str::contains("Product: Argan Oil"))
        .stdout(predicate::str::contains("Inventory: 3"));
}

#[test]
fn render_json_escapes_html_and_uses_store_name() {
    let dir = TempDir::new().expect("temp dir");
    let config = write_config(&dir, "[pipeline]\nstore_name = \"Curl Bar\"\n");
    let output = stockwatch()
        .args([
            "--config",
            &config,
            "--output",
            "json",
            "render",
            "--name",
            "<Gel & Wax>",
            "--inventory",
            "1",
        ])
        .output()
        .expect("run stockwatch");
    assert!(output.status.success());
    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(json["subject"], "Low stock: <Gel & Wax> (1 left)");
    let html = json["html"].as_str().expect("html string");
    assert!(html.contains("&lt;Gel &amp; Wax&gt;"));
    assert!(html.contains("Curl Bar"));
    assert!(json["text"].as_str().expect("text").contains("<Gel & Wax>"));
}

// ──────────────────────────────────────────────
// 4. Configuration errors
// ──────────────────────────────────────────────

#[test]
fn missing_config_file_fails() {
    stockwatch()
        .args(["--config", "/nonexistent/stockwatch.toml", "evaluate", "--after", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("stockwatch.toml"));
}

#[test]
fn unknown_config_key_fails() {
    let dir = TempDir::new().expect("temp dir");
    let config = write_config(&dir, "[pipeline]\nthresold = 3\n");
    stockwatch()
        .args(["--config", &config, "evaluate", "--after", "1"])
        .assert()
        .failure();
}

#[test]
fn invalid_env_threshold_fails() {
    stockwatch()
        .env("STOCKWATCH_LOW_STOCK_THRESHOLD", "five")
        .args(["evaluate", "--after", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("STOCKWATCH_LOW_STOCK_THRESHOLD"));
}

#[test]
fn serve_rejects_half_tls_flags() {
    stockwatch()
        .args(["serve", "--port", "0", "--tls-cert", "cert.pem"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--tls-cert and --tls-key"));
}
