#![cfg(unix)]

use hyperlens_test_utils::payloads::{discover_payload, export_payload, inspect_payload};
use hyperlens_test_utils::{FakeEngine, TableFixture};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn hyperlens_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_hyperlens"))
}

/// A scratch HYPERLENS_HOME whose config points at `engine`.
fn home_for(engine: &FakeEngine) -> TempDir {
    let home = TempDir::new().expect("create temp home");
    fs::write(home.path().join("config.toml"), engine.config_toml()).expect("write config");
    home
}

fn run_cli(home: &Path, args: &[&str]) -> Output {
    let mut cmd = Command::new(hyperlens_bin());
    cmd.args(args)
        .env("HYPERLENS_HOME", home)
        .env("RUST_LOG", "error")
        .env_remove("HYPERLENS_ENGINE")
        .env_remove("HYPERLENS_STAGING_DIR");
    cmd.output().expect("failed to execute hyperlens CLI")
}

fn describe(output: &Output) -> String {
    format!(
        "status: {:?}\nstdout:\n{}\nstderr:\n{}",
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

fn parse_json_output(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json_start = stdout
        .find(|c| c == '{' || c == '[')
        .unwrap_or_else(|| panic!("no JSON payload found in output\n{}", describe(output)));
    let mut deserializer = serde_json::Deserializer::from_str(&stdout[json_start..]);
    serde_json::Value::deserialize(&mut deserializer)
        .unwrap_or_else(|err| panic!("failed to parse JSON output: {}\n{}", err, describe(output)))
}

fn write_hyper(dir: &Path, name: &str, len: usize) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, vec![0u8; len]).expect("write fixture");
    path
}

#[test]
fn test_discover_json_lists_only_hyper_files() {
    let data = TempDir::new().unwrap();
    let extract = write_hyper(data.path(), "a.hyper", 1024);
    fs::write(data.path().join("b.txt"), "not an extract").unwrap();

    let engine = FakeEngine::responding(&discover_payload(data.path(), &[&extract]));
    let home = home_for(&engine);

    let dir_arg = data.path().to_string_lossy().to_string();
    let output = run_cli(home.path(), &["discover", &dir_arg, "--json"]);
    assert!(output.status.success(), "{}", describe(&output));

    let json = parse_json_output(&output);
    assert_eq!(json["files_found"], 1);
    assert_eq!(json["files"][0]["name"], "a.hyper");
    assert_eq!(json["files"][0]["size"], 1024);
    assert_eq!(engine.recorded_args(), vec!["discover".to_string(), dir_arg]);
}

#[test]
fn test_inspect_missing_file_fails_without_engine_call() {
    let engine = FakeEngine::responding(&inspect_payload("a.hyper", &[]));
    let home = home_for(&engine);

    let output = run_cli(home.path(), &["inspect", "/nonexistent/a.hyper"]);
    assert_eq!(output.status.code(), Some(1), "{}", describe(&output));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: File not found"), "{}", stderr);
    assert!(stderr.contains("TRY:"), "{}", stderr);
    assert!(engine.recorded_calls().is_empty());
}

#[test]
fn test_inspect_prints_tables() {
    let data = TempDir::new().unwrap();
    let extract = write_hyper(data.path(), "sales.hyper", 4096);
    let engine = FakeEngine::responding(&inspect_payload(
        "sales.hyper",
        &[TableFixture::numbered("Orders", 1200)],
    ));
    let home = home_for(&engine);

    let output = run_cli(home.path(), &["inspect", &extract.to_string_lossy()]);
    assert!(output.status.success(), "{}", describe(&output));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Extract.Orders"), "{}", stdout);
    assert!(stdout.contains("1,200"), "{}", stdout);
    assert!(stdout.contains("row 1"), "{}", stdout);
}

#[test]
fn test_export_rejects_zero_max_rows() {
    let data = TempDir::new().unwrap();
    let extract = write_hyper(data.path(), "sales.hyper", 64);
    let engine = FakeEngine::responding(&export_payload("sales.hyper", &[], None));
    let home = home_for(&engine);

    let output = run_cli(
        home.path(),
        &["export", &extract.to_string_lossy(), "--max-rows", "0"],
    );
    assert_eq!(output.status.code(), Some(1), "{}", describe(&output));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid --max-rows value"));
    assert!(engine.recorded_calls().is_empty());
}

#[test]
fn test_export_csv_to_file() {
    let data = TempDir::new().unwrap();
    let extract = write_hyper(data.path(), "sales.hyper", 64);
    let out_path = data.path().join("sales.csv");
    let engine = FakeEngine::responding(&export_payload(
        "sales.hyper",
        &[TableFixture::numbered("Orders", 3)],
        Some(2),
    ));
    let home = home_for(&engine);

    let output = run_cli(
        home.path(),
        &[
            "export",
            &extract.to_string_lossy(),
            "--max-rows",
            "2",
            "--format",
            "csv",
            "--output",
            &out_path.to_string_lossy(),
        ],
    );
    assert!(output.status.success(), "{}", describe(&output));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Exported 2 rows"));

    let csv = fs::read_to_string(&out_path).unwrap();
    assert_eq!(csv, "# Extract.Orders\nid,label\n1,row 1\n2,row 2\n");

    let args = engine.recorded_args();
    assert_eq!(&args[0], "export");
    assert_eq!(&args[2..], ["--max-rows", "2"]);
}

#[test]
fn test_export_json_to_stdout_sample() {
    let data = TempDir::new().unwrap();
    let extract = write_hyper(data.path(), "sales.hyper", 64);
    let engine = FakeEngine::responding(&export_payload(
        "sales.hyper",
        &[TableFixture::numbered("Orders", 20)],
        Some(5),
    ));
    let home = home_for(&engine);

    let output = run_cli(
        home.path(),
        &["export", &extract.to_string_lossy(), "--sample", "--max-rows", "100"],
    );
    assert!(output.status.success(), "{}", describe(&output));

    let json = parse_json_output(&output);
    assert_eq!(json["export_type"], "sample_only");
    assert_eq!(json["tables"][0]["exported_rows"], 5);
    assert_eq!(json["tables"][0]["data"].as_array().unwrap().len(), 5);
    assert_eq!(&engine.recorded_args()[2..], ["--sample-only"]);
}

#[test]
fn test_engine_failure_reports_stderr() {
    let data = TempDir::new().unwrap();
    let extract = write_hyper(data.path(), "broken.hyper", 64);
    let engine = FakeEngine::failing(2, "file is corrupt");
    let home = home_for(&engine);

    let output = run_cli(home.path(), &["inspect", &extract.to_string_lossy()]);
    assert_eq!(output.status.code(), Some(1), "{}", describe(&output));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("file is corrupt"), "{}", stderr);
    assert!(!stderr.contains("panicked"), "{}", stderr);
}

#[test]
fn test_engine_failure_json_error() {
    let data = TempDir::new().unwrap();
    let extract = write_hyper(data.path(), "broken.hyper", 64);
    let engine = FakeEngine::failing(2, "file is corrupt");
    let home = home_for(&engine);

    let output = run_cli(home.path(), &["inspect", &extract.to_string_lossy(), "--json"]);
    assert_eq!(output.status.code(), Some(1), "{}", describe(&output));

    let json = parse_json_output(&output);
    assert_eq!(json["success"], false);
    assert_eq!(json["kind"], "engine_failure");
    assert!(json["error"].as_str().unwrap().contains("file is corrupt"));
}

#[test]
fn test_config_json_reports_engine() {
    let engine = FakeEngine::from_script("exit 0");
    let home = home_for(&engine);

    let output = run_cli(home.path(), &["config", "--json"]);
    assert!(output.status.success(), "{}", describe(&output));

    let json = parse_json_output(&output);
    assert_eq!(json["home"], home.path().to_string_lossy().into_owned());
    assert_eq!(json["config_file"]["exists"], true);
    assert_eq!(json["logs"]["max_files"], 5);
    assert_eq!(json["engine"]["program"], "/bin/sh");
    assert_eq!(
        json["engine"]["args"][0],
        engine.script_path().to_string_lossy().into_owned()
    );
}
