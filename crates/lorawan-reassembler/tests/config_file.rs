// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Configuration files on disk and the `validate` / `gen-config` commands.

use lorawan_reassembler::config::EXAMPLE_CONFIG;
use lorawan_reassembler::{Config, ConfigError, Dialect};
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

const BIN: &str = env!("CARGO_BIN_EXE_lorawan-reassembler");

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("tempfile");
    file.write_all(content.as_bytes()).expect("write");
    file.flush().expect("flush");
    file
}

#[test]
fn test_example_config_loads() {
    let file = write_config(EXAMPLE_CONFIG);
    let config = Config::from_file(file.path()).expect("example config");

    assert!(config.input.mqtt.enable);
    assert_eq!(config.frame.lns, Dialect::Ttn);
    assert_eq!(config.frame.max_chunks, 15);
    assert_eq!(config.frame.max_age().as_secs(), 48 * 3600);
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = Config::from_file(dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn test_malformed_yaml() {
    let file = write_config("input: [unterminated");
    let err = Config::from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Yaml(_)));
}

#[test]
fn test_no_input_enabled() {
    let file = write_config(
        r#"
input:
  mqtt:
    enable: false
frame:
  max_chunks: 15
  timeout: 48
  lns: loriot
"#,
    );
    let err = Config::from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn test_cli_validate() {
    let file = write_config(EXAMPLE_CONFIG);
    let out = Command::new(BIN)
        .arg("validate")
        .arg("--config")
        .arg(file.path())
        .output()
        .expect("run validate");

    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Configuration valid!"));
    assert!(stdout.contains("ttn"));
}

#[test]
fn test_cli_validate_rejects_bad_file() {
    let file = write_config("frame:\n  max_chunks: 0\n  timeout: 48\n  lns: ttn\n");
    let out = Command::new(BIN)
        .args(["validate", "--config"])
        .arg(file.path())
        .output()
        .expect("run validate");

    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("Configuration invalid"));
}

#[test]
fn test_cli_gen_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("generated.yaml");

    let out = Command::new(BIN)
        .args(["gen-config", "--output"])
        .arg(&path)
        .output()
        .expect("run gen-config");
    assert!(out.status.success());
    assert_eq!(std::fs::read_to_string(&path).expect("read"), EXAMPLE_CONFIG);

    // Refuses to overwrite without --force
    let out = Command::new(BIN)
        .args(["gen-config", "--output"])
        .arg(&path)
        .output()
        .expect("run gen-config");
    assert!(!out.status.success());

    let out = Command::new(BIN)
        .args(["gen-config", "--force", "--output"])
        .arg(&path)
        .output()
        .expect("run gen-config");
    assert!(out.status.success());
}
