//! End-to-end tests driving the `docchat` binary.

mod common;

use axum::{routing::post, Json, Router};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

use common::pdf_with_pages;

fn docchat_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("docchat");
    path
}

fn run_docchat(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = docchat_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docchat binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// Temp dir with `docs/` holding two PDFs and a config with `extra` appended.
fn setup(extra: &str) -> (TempDir, PathBuf, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(
        docs.join("fees.pdf"),
        pdf_with_pages(&["Tuition fees are due in March"]),
    )
    .unwrap();
    fs::write(
        docs.join("campus.pdf"),
        pdf_with_pages(&["The library opens at nine", "Parking is free after six"]),
    )
    .unwrap();
    fs::write(docs.join("notes.txt"), "not a pdf").unwrap();

    let config_path = tmp.path().join("docchat.toml");
    fs::write(&config_path, extra).unwrap();
    (tmp, config_path, docs)
}

#[test]
fn test_chunks_json_lists_every_chunk() {
    let (_tmp, config_path, docs) = setup("[chunking]\nchunk_size = 12\nchunk_overlap = 4\n");

    let (stdout, stderr, success) = run_docchat(
        &config_path,
        &["chunks", docs.to_str().unwrap(), "--json"],
    );
    assert!(success, "chunks failed: {}", stderr);

    let chunks: Vec<Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert!(chunks.len() > 2);
    for chunk in &chunks {
        assert!(chunk["text"].as_str().unwrap().chars().count() <= 12);
    }
    let docs_seen: std::collections::HashSet<&str> = chunks
        .iter()
        .map(|c| c["document_id"].as_str().unwrap())
        .collect();
    assert_eq!(docs_seen.len(), 2);
}

#[test]
fn test_chunks_summary() {
    let (_tmp, config_path, docs) = setup("");
    let fees = docs.join("fees.pdf");

    let (stdout, stderr, success) = run_docchat(&config_path, &["chunks", fees.to_str().unwrap()]);
    assert!(success, "chunks failed: {}", stderr);
    assert!(stdout.contains("1 pages"));
    assert!(stdout.contains("1 chunks"));
    assert!(stdout.contains("Tuition fees are due in March"));
}

#[test]
fn test_invalid_chunking_config_fails_before_reading() {
    let (_tmp, config_path, docs) = setup("[chunking]\nchunk_size = 100\nchunk_overlap = 100\n");

    let (_stdout, stderr, success) =
        run_docchat(&config_path, &["chunks", docs.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("chunk_overlap"));
}

#[test]
fn test_unreadable_pdf_names_document() {
    let (_tmp, config_path, docs) = setup("");
    fs::write(docs.join("broken.pdf"), b"garbage").unwrap();

    let (_stdout, stderr, success) =
        run_docchat(&config_path, &["chunks", docs.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("broken.pdf"));
}

#[test]
fn test_completions() {
    let (_tmp, config_path, _docs) = setup("");
    let (stdout, _stderr, success) = run_docchat(&config_path, &["completions", "bash"]);
    assert!(success);
    assert!(stdout.contains("docchat"));
}

const VOCAB: [&str; 3] = ["tuition", "library", "parking"];

/// Stand-in for an Ollama server: keyword embeddings and an echoing chat.
async fn fake_ollama() -> String {
    let app = Router::new()
        .route(
            "/api/embed",
            post(|Json(body): Json<Value>| async move {
                let inputs = body["input"].as_array().cloned().unwrap_or_default();
                let embeddings: Vec<Vec<f32>> = inputs
                    .iter()
                    .map(|t| {
                        let lower = t.as_str().unwrap_or("").to_lowercase();
                        let mut v: Vec<f32> =
                            VOCAB.iter().map(|w| lower.matches(w).count() as f32).collect();
                        v.push(0.01);
                        v
                    })
                    .collect();
                Json(json!({ "embeddings": embeddings }))
            }),
        )
        .route(
            "/api/chat",
            post(|Json(body): Json<Value>| async move {
                let messages = body["messages"].as_array().cloned().unwrap_or_default();
                let last = messages
                    .last()
                    .and_then(|m| m["content"].as_str())
                    .unwrap_or("")
                    .to_string();
                Json(json!({
                    "message": {
                        "role": "assistant",
                        "content": format!("answer #{} to: {}", messages.len(), last)
                    },
                    "done": true
                }))
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_ask_multi_turn_against_ollama() {
    let url = fake_ollama().await;
    let (_tmp, config_path, docs) = setup(&format!(
        r#"
[embedding]
provider = "ollama"
model = "keywords"
dims = 4
url = "{url}"
max_retries = 0

[generation]
provider = "ollama"
model = "echo"
url = "{url}"
max_retries = 0
"#
    ));
    let docs = docs.to_str().unwrap().to_string();

    let (stdout, stderr, success) = tokio::task::spawn_blocking(move || {
        run_docchat(
            &config_path,
            &["ask", docs.as_str(), "-q", "When is tuition due?", "-q", "Where do I park?"],
        )
    })
    .await
    .unwrap();
    assert!(success, "ask failed: {}", stderr);

    assert!(stdout.contains("Indexed 2 documents (3 pages) into 2 chunks with ollama/keywords."));
    // First question: system + question. Second: system + Q1 + A1 + question.
    assert!(stdout.contains("answer #2 to: When is tuition due?"));
    assert!(stdout.contains("answer #4 to: Where do I park?"));
    assert!(stdout.contains("fees.pdf #0"));
}
