//! End-to-end CLI tests for the cdp-download binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Binary with an isolated, empty config location.
fn cdp_download(config_home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("cdp-download").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home.path())
        .env("HOME", config_home.path())
        .env_remove("RUST_LOG");
    cmd
}

async fn devtools_endpoint(browser: &str, protocol: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/json/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Browser": browser,
            "Protocol-Version": protocol,
            "User-Agent": "Mozilla/5.0",
            "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/browser/abc",
        })))
        .mount(&server)
        .await;
    server
}

#[test]
fn test_binary_help_displays_usage() {
    let home = TempDir::new().unwrap();
    cdp_download(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Diagnostics for browser download"));
}

#[test]
fn test_binary_version_displays_version() {
    let home = TempDir::new().unwrap();
    cdp_download(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("cdp-download"));
}

#[test]
fn test_binary_without_subcommand_fails() {
    let home = TempDir::new().unwrap();
    cdp_download(&home)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_config_prints_defaults_without_file() {
    let home = TempDir::new().unwrap();
    cdp_download(&home)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("none (defaults)"))
        .stdout(predicate::str::contains("timeout_ms = 4000"))
        .stdout(predicate::str::contains("polling_interval_ms = 200"))
        .stdout(predicate::str::contains("archive_root = \"build/downloads\""));
}

#[test]
fn test_config_reads_default_location() {
    let home = TempDir::new().unwrap();
    let dir = home.path().join("cdp-download");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), "timeout_ms = 9000\n").unwrap();

    cdp_download(&home)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"))
        .stdout(predicate::str::contains("timeout_ms = 9000"));
}

#[test]
fn test_config_rejects_out_of_range_value() {
    let home = TempDir::new().unwrap();
    let file = home.path().join("bad.toml");
    std::fs::write(&file, "polling_interval_ms = 0\n").unwrap();

    cdp_download(&home)
        .arg("--config")
        .arg(&file)
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("polling_interval_ms"));
}

#[test]
fn test_archive_moves_file_and_prints_new_path() {
    let home = TempDir::new().unwrap();
    let downloads = TempDir::new().unwrap();
    let archive_root = TempDir::new().unwrap();
    let source = downloads.path().join("invoice.pdf");
    std::fs::write(&source, b"%PDF").unwrap();

    let output = cdp_download(&home)
        .arg("archive")
        .arg(&source)
        .arg("--archive-root")
        .arg(archive_root.path())
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let printed = String::from_utf8(output).unwrap();
    let archived = std::path::PathBuf::from(printed.trim());
    assert!(archived.starts_with(archive_root.path()), "{printed}");
    assert_eq!(archived.file_name().unwrap(), "invoice.pdf");
    assert_eq!(std::fs::read(&archived).unwrap(), b"%PDF");
    assert!(!source.exists());
}

#[test]
fn test_archive_missing_file_fails() {
    let home = TempDir::new().unwrap();
    let archive_root = TempDir::new().unwrap();

    cdp_download(&home)
        .args(["archive", "does-not-exist.bin", "--archive-root"])
        .arg(archive_root.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("does-not-exist.bin"));
}

#[test]
fn test_probe_invalid_endpoint_fails() {
    let home = TempDir::new().unwrap();
    cdp_download(&home)
        .args(["probe", "not a url"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid DevTools endpoint"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_probe_reports_supported_chrome() {
    let server = devtools_endpoint("Chrome/120.0.6099.109", "1.3").await;
    let home = TempDir::new().unwrap();

    cdp_download(&home)
        .args(["probe", &server.uri()])
        .assert()
        .success()
        .stdout(predicate::str::contains("browser: Chrome/120.0.6099.109"))
        .stdout(predicate::str::contains("download events: supported"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_probe_fails_for_old_protocol() {
    let server = devtools_endpoint("Chrome/60.0.3112.0", "1.2").await;
    let home = TempDir::new().unwrap();

    cdp_download(&home)
        .args(["probe", &server.uri()])
        .assert()
        .failure()
        .stdout(predicate::str::contains("protocol: 1.2"))
        .stderr(predicate::str::contains("does not report download events"));
}
