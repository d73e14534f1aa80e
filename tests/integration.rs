use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn csvmeta_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("csvmeta");
    path
}

fn setup_test_env_with_limit(max_file_size_bytes: u64) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    // Objects live at <root>/objects/<bucket>/<key>
    let bucket_dir = root.join("objects").join("uploads");
    fs::create_dir_all(bucket_dir.join("data")).unwrap();
    fs::write(bucket_dir.join("data/sample.csv"), "a,b\n1,2\n3,4\n").unwrap();
    fs::write(
        bucket_dir.join("people.csv"),
        "name,age,city\nAda,36,London\nAlan,41,Wilmslow\nGrace,85,Arlington\n",
    )
    .unwrap();
    fs::write(bucket_dir.join("ragged.csv"), "a,b\n1,2\n3,4,5\n").unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/csvmeta.sqlite"

[pipeline]
max_file_size_bytes = {max}
table = "csv_metadata"

[object_store]
provider = "filesystem"
root = "{root}/objects"
"#,
        root = root.display(),
        max = max_file_size_bytes,
    );

    let config_path = config_dir.join("csvmeta.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn setup_test_env() -> (TempDir, PathBuf) {
    setup_test_env_with_limit(10_485_760)
}

fn run_csvmeta(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = csvmeta_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run csvmeta binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

/// Parse the `{"statusCode", "body"}` envelope printed by `process`/`invoke`.
fn parse_envelope(stdout: &str) -> (u64, serde_json::Value) {
    let env: serde_json::Value = serde_json::from_str(stdout)
        .unwrap_or_else(|e| panic!("stdout is not an envelope ({}): {}", e, stdout));
    let status = env["statusCode"].as_u64().unwrap();
    let body = serde_json::from_str(env["body"].as_str().unwrap()).unwrap();
    (status, body)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_csvmeta(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/csvmeta.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_csvmeta(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_csvmeta(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_process_sample_file() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_csvmeta(
        &config_path,
        &["process", "--bucket", "uploads", "--key", "data/sample.csv"],
    );
    assert!(success, "process failed: stdout={}, stderr={}", stdout, stderr);

    let (status, body) = parse_envelope(&stdout);
    assert_eq!(status, 200);
    assert_eq!(body["message"], "CSV file processed successfully");

    let metadata = &body["metadata"];
    assert_eq!(metadata["filename"], "data/sample.csv");
    assert_eq!(metadata["file_size_bytes"], 13);
    assert_eq!(metadata["row_count"], 2);
    assert_eq!(metadata["column_count"], 2);
    assert_eq!(metadata["column_names"], serde_json::json!(["a", "b"]));

    let ts = metadata["upload_timestamp"].as_str().unwrap();
    assert!(
        chrono::NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S").is_ok(),
        "bad timestamp: {}",
        ts
    );

    assert!(stderr.contains("Processing file: data/sample.csv from bucket: uploads"));
}

#[test]
fn test_process_then_get_and_list() {
    let (_tmp, config_path) = setup_test_env();

    run_csvmeta(
        &config_path,
        &["process", "--bucket", "uploads", "--key", "people.csv"],
    );
    run_csvmeta(
        &config_path,
        &["process", "--bucket", "uploads", "--key", "data/sample.csv"],
    );

    let (stdout, stderr, success) = run_csvmeta(&config_path, &["get", "people.csv"]);
    assert!(success, "get failed: stdout={}, stderr={}", stdout, stderr);
    let record: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(record["row_count"], 3);
    assert_eq!(
        record["column_names"],
        serde_json::json!(["name", "age", "city"])
    );

    let (stdout, _, success) = run_csvmeta(&config_path, &["list"]);
    assert!(success);
    assert!(stdout.contains("csv_metadata (2 records)"));
    assert!(stdout.contains("data/sample.csv"));
    assert!(stdout.contains("people.csv  rows=3  columns=3"));
}

#[test]
fn test_get_unknown_file_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_csvmeta(&config_path, &["init"]);

    let (_, stderr, success) = run_csvmeta(&config_path, &["get", "never-seen.csv"]);
    assert!(!success);
    assert!(stderr.contains("no metadata stored for: never-seen.csv"));
}

#[test]
fn test_process_malformed_file_is_400() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_csvmeta(
        &config_path,
        &["process", "--bucket", "uploads", "--key", "ragged.csv"],
    );
    assert!(!success, "malformed CSV must exit non-zero");

    let (status, body) = parse_envelope(&stdout);
    assert_eq!(status, 400);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Error parsing CSV file: "));

    let (_, _, found) = run_csvmeta(&config_path, &["get", "ragged.csv"]);
    assert!(!found, "rejected files must not be recorded");
}

#[test]
fn test_process_oversize_file_is_400() {
    let (_tmp, config_path) = setup_test_env_with_limit(10);

    let (stdout, _, success) = run_csvmeta(
        &config_path,
        &["process", "--bucket", "uploads", "--key", "data/sample.csv"],
    );
    assert!(!success);

    let (status, body) = parse_envelope(&stdout);
    assert_eq!(status, 400);
    assert_eq!(
        body["error"],
        "File size 13 bytes exceeds maximum allowed size of 10 bytes"
    );
}

#[test]
fn test_process_missing_object_is_500() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_csvmeta(
        &config_path,
        &["process", "--bucket", "uploads", "--key", "missing.csv"],
    );
    assert!(!success);

    let (status, body) = parse_envelope(&stdout);
    assert_eq!(status, 500);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Error processing CSV file: "));
}

#[test]
fn test_invoke_event_file() {
    let (tmp, config_path) = setup_test_env();

    let event_path = tmp.path().join("event.json");
    fs::write(
        &event_path,
        r#"{
  "Records": [
    {
      "eventSource": "aws:s3",
      "eventName": "ObjectCreated:Put",
      "s3": {
        "bucket": { "name": "uploads" },
        "object": { "key": "people.csv", "size": 66 }
      }
    }
  ]
}"#,
    )
    .unwrap();

    let (stdout, stderr, success) =
        run_csvmeta(&config_path, &["invoke", event_path.to_str().unwrap()]);
    assert!(success, "invoke failed: stdout={}, stderr={}", stdout, stderr);

    let (status, body) = parse_envelope(&stdout);
    assert_eq!(status, 200);
    assert_eq!(body["metadata"]["filename"], "people.csv");
    assert_eq!(body["metadata"]["row_count"], 3);
}

#[test]
fn test_invoke_event_without_records_is_500() {
    let (tmp, config_path) = setup_test_env();

    let event_path = tmp.path().join("event.json");
    fs::write(&event_path, r#"{ "Records": [] }"#).unwrap();

    let (stdout, _, success) =
        run_csvmeta(&config_path, &["invoke", event_path.to_str().unwrap()]);
    assert!(!success);

    let (status, _) = parse_envelope(&stdout);
    assert_eq!(status, 500);
}

#[test]
fn test_invoke_invalid_json_prints_500_envelope() {
    let (tmp, config_path) = setup_test_env();

    let event_path = tmp.path().join("bad.json");
    fs::write(&event_path, "{not json").unwrap();

    let (stdout, stderr, success) =
        run_csvmeta(&config_path, &["invoke", event_path.to_str().unwrap()]);
    assert!(!success);

    let (status, body) = parse_envelope(&stdout);
    assert_eq!(status, 500, "stderr={}", stderr);
    let error = body["error"].as_str().unwrap();
    assert!(error.starts_with("Error processing CSV file: "), "{}", error);
    assert!(error.contains("Event file is not valid JSON"), "{}", error);
}

#[test]
fn test_reprocess_keeps_single_record() {
    let (_tmp, config_path) = setup_test_env();

    for _ in 0..2 {
        let (_, _, success) = run_csvmeta(
            &config_path,
            &["process", "--bucket", "uploads", "--key", "data/sample.csv"],
        );
        assert!(success);
    }

    let (stdout, _, _) = run_csvmeta(&config_path, &["list"]);
    assert!(stdout.contains("csv_metadata (1 records)"));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_csvmeta(&tmp.path().join("absent.toml"), &["list"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}
