/// CLI smoke tests: invoke the compiled binary, no network required.
/// Indexes are written to temp dirs; an index without chunks never reaches
/// the embedding or generation services.
use assert_cmd::Command;
use std::path::Path;
use tempfile::TempDir;

#[allow(deprecated)]
fn kbchat() -> Command {
    let mut cmd = Command::cargo_bin("kbchat").unwrap();
    cmd.env("NO_COLOR", "1")
        .env_remove("KBCHAT_INDEX")
        .env_remove("HF_API_KEY")
        .env_remove("OPENAI_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

fn write(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path.display().to_string()
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8_lossy(&output).to_string()
}

// ── Binary runs ──────────────────────────────────────────────────────────

#[test]
fn help_flag_exits_zero() {
    kbchat().arg("--help").assert().success();
}

#[test]
fn version_flag_exits_zero() {
    kbchat().arg("--version").assert().success();
}

// ── Index load failures are fatal ────────────────────────────────────────

#[test]
fn chat_missing_index_fails() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.json");
    let output = kbchat()
        .args(["chat", "--index", missing.to_str().unwrap()])
        .write_stdin("hello\n")
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let text = String::from_utf8_lossy(&output);
    assert!(text.contains("Index load failed"), "got: {}", text);
}

#[test]
fn ask_corrupt_index_fails() {
    let tmp = TempDir::new().unwrap();
    let index = write(
        tmp.path(),
        "index.json",
        r#"{"metadata": {"provider": "huggingface", "model": "m", "dimension": 2},
            "sections": [{"name": "A", "chunks": ["a", "b"], "embeddings": [[1.0, 0.0]]}]}"#,
    );
    let output = kbchat()
        .args(["ask", "anything", "--index", &index])
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    assert!(String::from_utf8_lossy(&output).contains("corrupt index"));
}

// ── Empty index answers with the apology ─────────────────────────────────

#[test]
fn chat_empty_index_apologizes_and_exits() {
    let tmp = TempDir::new().unwrap();
    let index = write(tmp.path(), "index.json", "{}");
    let text = stdout_of(
        kbchat()
            .args(["chat", "--index", &index])
            .write_stdin("\nhow much does it cost\nExit\n"),
    );
    assert!(text.contains("Input cannot be empty"), "got: {}", text);
    assert!(text.contains("couldn't locate relevant information"));
    assert!(text.contains("Goodbye"));
}

#[test]
fn ask_empty_index_apologizes() {
    let tmp = TempDir::new().unwrap();
    let index = write(tmp.path(), "index.json", "{}");
    let text = stdout_of(kbchat().args(["ask", "pricing?", "--index", &index]));
    assert!(text.contains("couldn't locate relevant information"));
}

#[test]
fn ask_unknown_provider_fails() {
    let tmp = TempDir::new().unwrap();
    let index = write(tmp.path(), "index.json", "{}");
    kbchat()
        .args(["ask", "q", "--index", &index, "--provider", "nonsense"])
        .assert()
        .failure();
}

// ── Inspect / build ──────────────────────────────────────────────────────

#[test]
fn inspect_lists_sections() {
    let tmp = TempDir::new().unwrap();
    let index = write(
        tmp.path(),
        "index.json",
        r#"{"Pricing": {"chunks": ["Plans start at $10/mo"], "embeddings": [[0.1, 0.9]]},
            "Affiliates": {"chunks": [], "embeddings": []},
            "_embedding_model": "all-MiniLM-L6-v2"}"#,
    );
    let text = stdout_of(kbchat().args(["inspect", "--index", &index]));
    assert!(text.contains("Pricing"));
    assert!(text.contains("Affiliates"));
    assert!(text.contains("sentence-transformers/all-MiniLM-L6-v2"));
    assert!(text.contains("Plans start at $10/mo"));
    assert!(!text.contains("_embedding_model"));
}

#[test]
fn build_with_nothing_to_index_fails() {
    let tmp = TempDir::new().unwrap();
    let input = write(
        tmp.path(),
        "scraped.json",
        r#"{"Homepage": {"context": "<p>too short</p>"}}"#,
    );
    let output = tmp.path().join("index.json");
    kbchat()
        .args([
            "build",
            "--input",
            &input,
            "--output",
            output.to_str().unwrap(),
            "--provider",
            "ollama",
            "--endpoint",
            "http://127.0.0.1:9",
        ])
        .assert()
        .failure();
    assert!(!output.exists());
}
