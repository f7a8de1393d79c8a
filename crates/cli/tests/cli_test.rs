//! Command-line tests that need no language model

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const RUN: &str = r#"{
  "run_id": "2f1b5c9e-7a43-4f0e-9a51-3d8c2e6b1a70",
  "built_at": "2026-01-05T10:00:00Z",
  "data_folder": "DATA",
  "graph": {"nodes": [], "relationships": []},
  "partition": {"communities": [], "modularity": 0.0, "levels": 0},
  "summaries": [
    {"community_index": 0, "text": "Inflation rose in 2023."},
    {"community_index": 1, "text": "Error summarizing community 1", "error": "timed out"}
  ],
  "report": {
    "files_loaded": 1,
    "file_failures": [{"path": "DATA/binary.dat", "error": "not UTF-8"}],
    "chunks": [{"file": "inflation.txt", "chunk": 0, "status": "failed", "error": "bad json", "attempts": 1}],
    "stats": {"files": 1, "chunks": 1, "entities": 0, "relationships": 1, "provenance_edges": 1},
    "elapsed_ms": 1500
  }
}"#;

/// A data folder with one article and a run directory whose saved run points at it
fn setup() -> (TempDir, TempDir) {
    let data = TempDir::new().unwrap();
    fs::write(data.path().join("inflation.txt"), "Inflation rose in 2023.").unwrap();
    fs::write(data.path().join("notes.md"), "not an article").unwrap();

    let run_dir = TempDir::new().unwrap();
    let run = RUN.replace("DATA", &data.path().display().to_string());
    fs::write(run_dir.path().join("run.json"), run).unwrap();
    (data, run_dir)
}

fn commgraph(run_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("commgraph").unwrap();
    cmd.current_dir(run_dir)
        .env("LLM_PROVIDER", "ollama")
        .env_remove("RUST_LOG")
        .arg("--run-dir")
        .arg(run_dir);
    cmd
}

#[test]
fn test_help_lists_commands() {
    Command::cargo_bin("commgraph")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("query"))
        .stdout(predicate::str::contains("show-source"));
}

#[test]
fn test_sources_lists_txt_articles() {
    let (data, run_dir) = setup();

    commgraph(run_dir.path())
        .arg("sources")
        .arg(data.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("inflation.txt"))
        .stdout(predicate::str::contains("notes.md").not());
}

#[test]
fn test_show_source_uses_saved_folder() {
    let (_data, run_dir) = setup();

    commgraph(run_dir.path())
        .args(["show-source", "inflation.txt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Inflation rose in 2023."));
}

#[test]
fn test_show_source_missing_file() {
    let (data, run_dir) = setup();

    commgraph(run_dir.path())
        .args(["show-source", "missing.txt", "--folder"])
        .arg(data.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("File not found."));
}

#[test]
fn test_communities_digest() {
    let (_data, run_dir) = setup();

    commgraph(run_dir.path())
        .arg("communities")
        .assert()
        .success()
        .stdout(predicate::str::contains("Community 1: Inflation rose in 2023."))
        .stdout(predicate::str::contains("Community 2: Error summarizing community 1"));
}

#[test]
fn test_stats_reports_failures() {
    let (_data, run_dir) = setup();

    commgraph(run_dir.path())
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("Files: 1"))
        .stdout(predicate::str::contains("Files skipped: 1"))
        .stdout(predicate::str::contains("Chunks failed: 1"))
        .stdout(predicate::str::contains("Summaries failed: 1"));
}

#[test]
fn test_sentinel_query_needs_no_model() {
    let (_data, run_dir) = setup();

    commgraph(run_dir.path())
        .args(["query", "Select an option..."])
        .assert()
        .success()
        .stdout(predicate::str::contains("Please select a valid query."));
}

#[test]
fn test_query_without_saved_run_fails() {
    let empty = TempDir::new().unwrap();

    commgraph(empty.path())
        .args(["query", "What happened to inflation?"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No saved run"));
}

#[test]
fn test_query_loads_prompt_overrides() {
    let (_data, run_dir) = setup();
    let prompts = TempDir::new().unwrap();
    fs::write(prompts.path().join("final_answers.txt"), "Answer in one sentence.").unwrap();

    commgraph(run_dir.path())
        .args(["query", "Select an option...", "--prompts"])
        .arg(prompts.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Please select a valid query."));

    commgraph(run_dir.path())
        .args(["query", "Select an option...", "--prompts"])
        .arg(prompts.path().join("missing"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load prompts"));
}

#[test]
fn test_query_ignores_chunking_settings() {
    let (_data, run_dir) = setup();

    commgraph(run_dir.path())
        .env("CHUNK_SIZE", "10")
        .env("CHUNK_OVERLAP", "50")
        .args(["query", "Select an option..."])
        .assert()
        .success()
        .stdout(predicate::str::contains("Please select a valid query."));
}
