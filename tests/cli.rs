//! Binary-level tests for the `rag` CLI. Providers are configured for a
//! local Ollama so no API key is needed; no test reaches a model.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn rag_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_rag"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_content = format!(
        r#"[index]
dir = "{}/vectorstore"
collection = "cli-test"

[embedding]
provider = "ollama"
model = "nomic-embed-text"
dims = 768
url = "http://127.0.0.1:9"

[generation]
provider = "ollama"
model = "llama3.2"
base_url = "http://127.0.0.1:9/v1"

[fetch]
timeout_secs = 5
"#,
        root.display()
    );

    let config_path = root.join("rag.toml");
    fs::write(&config_path, config_content).unwrap();
    (tmp, config_path)
}

fn run_rag(config_path: &Path, args: &[&str]) -> (String, String, Option<i32>) {
    let output = Command::new(rag_binary())
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run rag binary");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code(),
    )
}

fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/rates", addr)
}

#[test]
fn test_init_creates_index() {
    let (tmp, config) = setup_test_env();
    let (stdout, stderr, code) = run_rag(&config, &["init"]);
    assert_eq!(code, Some(0), "stderr: {}", stderr);
    assert!(stdout.contains("Index initialized"));
    assert!(tmp.path().join("vectorstore/index.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config) = setup_test_env();
    let (_, _, first) = run_rag(&config, &["init"]);
    let (_, stderr, second) = run_rag(&config, &["init"]);
    assert_eq!(first, Some(0));
    assert_eq!(second, Some(0), "stderr: {}", stderr);
}

#[test]
fn test_ingest_without_urls() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, code) = run_rag(&config, &["ingest", "--url", "  "]);
    assert_eq!(code, Some(2));
    assert!(stderr.contains("You must provide at least one valid URL!"));

    let (_, stderr, code) = run_rag(&config, &["chat"]);
    assert_eq!(code, Some(2));
    assert!(stderr.contains("You must provide at least one valid URL!"));
}

#[test]
fn test_ask_before_ingest() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, code) = run_rag(&config, &["ask", "What was the rate?"]);
    assert_eq!(code, Some(2), "stdout: {}", stdout);
    assert!(stderr.contains("You must process the URLs first!"));
    assert!(!stderr.contains("Error:"));
}

#[test]
fn test_ingest_reports_failed_url_and_finishes() {
    let (_tmp, config) = setup_test_env();
    let url = closed_port_url();
    let (stdout, stderr, code) = run_rag(&config, &["ingest", "--url", &url]);
    assert_eq!(code, Some(0), "stderr: {}", stderr);

    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.first(), Some(&"Initializing components..."));
    assert!(lines.contains(&"Resetting vector store..."));
    assert!(lines.contains(&"Loading data..."));
    assert!(lines.iter().any(|l| l.starts_with(&format!("Skipping {}", url))));
    assert_eq!(lines.last(), Some(&"Done adding docs to the vector database..."));

    let (stdout, _, code) = run_rag(&config, &["status"]);
    assert_eq!(code, Some(0));
    assert!(stdout.contains("cli-test"));
    assert!(stdout.contains("nomic-embed-text (768 dims)"));
    assert!(stdout.contains("Complete:        yes"));
}

#[test]
fn test_ingest_json_progress() {
    let (_tmp, config) = setup_test_env();
    let url = closed_port_url();
    let (stdout, stderr, code) =
        run_rag(&config, &["ingest", "--url", &url, "--progress", "json"]);
    assert_eq!(code, Some(0), "stderr: {}", stderr);

    let events: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(events[0]["status"], "initializing");
    assert!(events.iter().any(|e| e["status"] == "fetch_failed" && e["url"] == url.as_str()));
    assert_eq!(events.last().unwrap()["status"], "done");
}

#[test]
fn test_too_many_urls() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, code) = run_rag(
        &config,
        &[
            "ingest",
            "--url",
            "https://a.example",
            "--url",
            "https://b.example",
            "--url",
            "https://c.example",
            "--url",
            "https://d.example",
        ],
    );
    assert_ne!(code, Some(0));
    assert!(stderr.contains("fetch.max_urls"));
}

#[test]
fn test_status_without_collection() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, code) = run_rag(&config, &["status"]);
    assert_eq!(code, Some(0));
    assert!(stdout.contains("does not exist yet"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let (tmp, _) = setup_test_env();
    let bad = tmp.path().join("bad.toml");
    fs::write(&bad, "[chunking]\nmax_chars = 10\noverlap_chars = 10\n").unwrap();
    let (_, stderr, code) = run_rag(&bad, &["status"]);
    assert_ne!(code, Some(0));
    assert!(stderr.contains("overlap_chars"));
}
