use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn dcmp_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("dcmp");
    path
}

const LEFT: &str = "The committee reviewed the quarterly budget and approved the new \
    hiring plan for the research department after a long discussion.";
const RIGHT: &str = "After lunch the committee reviewed the quarterly budget and approved \
    the new hiring plan for the research department without objection.";

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(files_dir.join("left.txt"), LEFT).unwrap();
    fs::write(files_dir.join("right.txt"), RIGHT).unwrap();
    fs::write(files_dir.join("picture.png"), b"\x89PNG\r\n").unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/dcmp.sqlite"

[extract]
pdf_max_pages = 10

[ai]
timeout_secs = 5
"#,
        root.display()
    );

    let config_path = config_dir.join("dcmp.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_dcmp(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = dcmp_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run dcmp binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn file(tmp: &TempDir, name: &str) -> String {
    tmp.path().join("files").join(name).display().to_string()
}

#[test]
fn test_init_creates_database() {
    let (tmp, config) = setup_test_env();
    let (stdout, stderr, ok) = run_dcmp(&config, &["init"]);
    assert!(ok, "init failed: {}", stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/dcmp.sqlite").exists());

    // idempotent
    let (_, _, ok) = run_dcmp(&config, &["init"]);
    assert!(ok);
}

#[test]
fn test_parse_text_file() {
    let (tmp, config) = setup_test_env();
    let (stdout, stderr, ok) = run_dcmp(&config, &["parse", &file(&tmp, "left.txt")]);
    assert!(ok, "parse failed: {}", stderr);
    assert!(stdout.contains("TXT text file"));
    assert!(stdout.contains("quarterly budget"));
}

#[test]
fn test_parse_json_output() {
    let (tmp, config) = setup_test_env();
    let (stdout, _, ok) = run_dcmp(&config, &["parse", &file(&tmp, "left.txt"), "--json"]);
    assert!(ok);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["content"], LEFT);
    assert_eq!(json["properties"]["filename"], "left.txt");
    assert_eq!(
        json["properties"]["contentLength"],
        LEFT.chars().count().to_string()
    );
}

#[test]
fn test_parse_unsupported_type_fails() {
    let (tmp, config) = setup_test_env();
    let (_, stderr, ok) = run_dcmp(&config, &["parse", &file(&tmp, "picture.png")]);
    assert!(!ok);
    assert!(stderr.contains("unsupported file type: .png"));
}

#[test]
fn test_missing_config_uses_defaults() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("note.txt");
    fs::write(&path, "hello").unwrap();
    let missing = tmp.path().join("nope.toml");
    let (stdout, stderr, ok) = run_dcmp(&missing, &["parse", path.to_str().unwrap()]);
    assert!(ok, "parse failed: {}", stderr);
    assert!(stdout.contains("hello"));
}

#[test]
fn test_compare_records_history() {
    let (tmp, config) = setup_test_env();
    let (stdout, stderr, ok) = run_dcmp(
        &config,
        &["compare", &file(&tmp, "left.txt"), &file(&tmp, "right.txt")],
    );
    assert!(ok, "compare failed: {}", stderr);
    assert!(stdout.contains("Similarity:"));
    assert!(stdout.contains("Similar segments: 1"));

    let (stdout, _, ok) = run_dcmp(&config, &["history", "list", "--json"]);
    assert!(ok);
    let records: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let records = records.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["filename"], "left.txt vs right.txt");
    assert_eq!(records[0]["similarSegments"].as_array().unwrap().len(), 1);

    // property-check history is a separate list
    let (stdout, _, _) = run_dcmp(&config, &["history", "list", "--mode", "property-check"]);
    assert!(stdout.contains("No recent records."));

    let (_, _, ok) = run_dcmp(&config, &["history", "clear"]);
    assert!(ok);
    let (stdout, _, _) = run_dcmp(&config, &["history", "list"]);
    assert!(stdout.contains("No recent records."));
}

#[test]
fn test_compare_no_record() {
    let (tmp, config) = setup_test_env();
    let (_, stderr, ok) = run_dcmp(
        &config,
        &[
            "compare",
            &file(&tmp, "left.txt"),
            &file(&tmp, "right.txt"),
            "--no-record",
        ],
    );
    assert!(ok, "compare failed: {}", stderr);
    let (stdout, _, _) = run_dcmp(&config, &["history", "list"]);
    assert!(stdout.contains("No recent records."));
}

#[test]
fn test_history_delete_unknown_id_fails() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, ok) = run_dcmp(&config, &["history", "delete", "12345"]);
    assert!(!ok);
    assert!(stderr.contains("record not found"));
}

#[test]
fn test_properties_check() {
    let (tmp, config) = setup_test_env();
    let (stdout, stderr, ok) = run_dcmp(
        &config,
        &["properties", &file(&tmp, "left.txt"), &file(&tmp, "right.txt")],
    );
    assert!(ok, "properties failed: {}", stderr);
    assert!(stdout.contains("Author"));
    assert!(stdout.contains("properties match"));

    let (stdout, _, ok) = run_dcmp(
        &config,
        &["history", "list", "--mode", "property-check", "--json"],
    );
    assert!(ok);
    let records: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert!(records[0]["propertyDetails"].is_array());
}

#[test]
fn test_settings_set_show_reset() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, ok) = run_dcmp(&config, &["settings", "set", "minDuplicateWords", "3"]);
    assert!(ok, "set failed: {}", stderr);
    let (_, _, ok) = run_dcmp(&config, &["settings", "set", "apiKey", "sk-secret-1234"]);
    assert!(ok);

    let (stdout, _, ok) = run_dcmp(&config, &["settings", "show"]);
    assert!(ok);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["minDuplicateWords"], 3);
    assert_eq!(json["apiKey"], "**********1234");

    let (_, _, ok) = run_dcmp(&config, &["settings", "reset"]);
    assert!(ok);
    let (stdout, _, _) = run_dcmp(&config, &["settings", "show"]);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["minDuplicateWords"], 8);
    assert_eq!(json["apiKey"], "");
}

#[test]
fn test_settings_set_rejects_bad_values() {
    let (_tmp, config) = setup_test_env();
    let (_, _, ok) = run_dcmp(&config, &["settings", "set", "ignoreCase", "maybe"]);
    assert!(!ok);
    let (_, _, ok) = run_dcmp(&config, &["settings", "set", "noSuchField", "1"]);
    assert!(!ok);
}

#[test]
fn test_analyze_without_key_fails_fast() {
    let (tmp, config) = setup_test_env();
    let (stdout, stderr, ok) = run_dcmp(
        &config,
        &["analyze", &file(&tmp, "left.txt"), &file(&tmp, "right.txt")],
    );
    assert!(!ok);
    assert!(stdout.contains("AI analysis failed"));
    assert!(stderr.contains("API key is not configured"));
}
