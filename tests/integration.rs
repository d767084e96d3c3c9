use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn repo_rag_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_repo-rag"))
}

struct TestEnv {
    _tmp: TempDir,
    root: PathBuf,
    config_path: PathBuf,
}

impl TestEnv {
    fn file(&self, name: &str) -> String {
        self.root.join("files").join(name).display().to_string()
    }
}

fn setup_test_env() -> TestEnv {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("alpha.md"),
        "# Alpha\n\nThis document covers Rust ownership, borrowing, and cargo crates.",
    )
    .unwrap();
    fs::write(
        files_dir.join("beta.py"),
        "def train(model):\n    \"\"\"Train a PyTorch model on the dataset.\"\"\"\n    return model.fit()\n",
    )
    .unwrap();
    fs::write(
        files_dir.join("gamma.txt"),
        "Deployment notes: Kubernetes and Docker run the infrastructure.",
    )
    .unwrap();
    fs::write(files_dir.join("logo.png"), [0x89u8, b'P', b'N', b'G']).unwrap();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_content = format!(
        r#"[index]
persist_dir = "{}/data/index"
collection = "repo_docs"

[chunking]
chunk_size = 800
chunk_overlap = 100

[retrieval]
top_k = 4

[embedding]
provider = "hash"
dims = 384

[generation]
provider = "disabled"

[logging]
level = "warn"
"#,
        root.display()
    );
    let config_path = config_dir.join("repo-rag.toml");
    fs::write(&config_path, config_content).unwrap();

    TestEnv {
        _tmp: tmp,
        root,
        config_path,
    }
}

fn run(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = repo_rag_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run repo-rag binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_creates_database() {
    let env = setup_test_env();
    let (stdout, stderr, success) = run(&env.config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(env.root.join("data/index/index.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let env = setup_test_env();
    let (_, _, first) = run(&env.config_path, &["init"]);
    assert!(first, "First init failed");
    let (_, _, second) = run(&env.config_path, &["init"]);
    assert!(second, "Second init failed (not idempotent)");
}

#[test]
fn test_index_reports_stats() {
    let env = setup_test_env();
    let missing = env.file("missing.md");
    let (stdout, stderr, success) = run(
        &env.config_path,
        &[
            "index",
            &env.file("alpha.md"),
            &env.file("beta.py"),
            &env.file("logo.png"),
            &missing,
        ],
    );
    assert!(success, "index failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("added chunks: 2"));
    assert!(stdout.contains("skipped files: 1"));
    assert!(stdout.contains(&format!("{}: not found", missing)));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_index_json_output() {
    let env = setup_test_env();
    let (stdout, stderr, success) = run(
        &env.config_path,
        &["index", &env.file("gamma.txt"), &env.file("logo.png"), "--json"],
    );
    assert!(success, "index failed: stderr={}", stderr);

    let stats: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(stats["added_chunks"], 1);
    assert_eq!(stats["skipped_files"], 1);
    assert_eq!(stats["errors"].as_array().unwrap().len(), 0);
}

#[test]
fn test_reindex_does_not_duplicate() {
    let env = setup_test_env();
    let alpha = env.file("alpha.md");
    run(&env.config_path, &["index", &alpha]);
    run(&env.config_path, &["index", &alpha]);

    let (stdout, _, success) = run(&env.config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Entries:     1"), "stats: {}", stdout);
    assert!(stdout.contains("Sources:     1"));
}

#[test]
fn test_query_ranks_matching_file_first() {
    let env = setup_test_env();
    run(
        &env.config_path,
        &[
            "index",
            &env.file("alpha.md"),
            &env.file("beta.py"),
            &env.file("gamma.txt"),
        ],
    );

    let (stdout, stderr, success) = run(
        &env.config_path,
        &["query", "kubernetes docker deployment", "--top-k", "1", "--json"],
    );
    assert!(success, "query failed: stderr={}", stderr);

    let retrieved: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let metadatas = retrieved["metadatas"].as_array().unwrap();
    assert_eq!(metadatas.len(), 1);
    assert_eq!(metadatas[0]["source"], env.file("gamma.txt"));
    assert_eq!(metadatas[0]["chunk_index"], 0);
}

#[test]
fn test_query_deterministic() {
    let env = setup_test_env();
    run(
        &env.config_path,
        &["index", &env.file("alpha.md"), &env.file("beta.py")],
    );

    let (first, _, _) = run(&env.config_path, &["query", "rust cargo", "--json"]);
    let (second, _, _) = run(&env.config_path, &["query", "rust cargo", "--json"]);
    assert_eq!(first, second);
}

#[test]
fn test_query_empty_index() {
    let env = setup_test_env();
    let (stdout, _, success) = run(&env.config_path, &["query", "anything"]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_query_zero_top_k_fails() {
    let env = setup_test_env();
    let (_, stderr, success) = run(&env.config_path, &["query", "anything", "--top-k", "0"]);
    assert!(!success);
    assert!(stderr.contains("top_k"));
}

#[test]
fn test_ask_with_disabled_generator_fails_loudly() {
    let env = setup_test_env();
    let (stdout, stderr, success) = run(
        &env.config_path,
        &["ask", "what is alpha about?", "--file", &env.file("alpha.md"), "--json"],
    );
    assert!(!success, "ask should fail: stdout={}", stdout);
    assert!(stderr.contains("disabled"));
    assert!(stdout.trim().is_empty());
}

#[test]
fn test_briefs_with_disabled_generator_reports_per_file() {
    let env = setup_test_env();
    let (stdout, stderr, success) = run(
        &env.config_path,
        &[
            "briefs",
            &env.file("alpha.md"),
            &env.file("logo.png"),
            &env.file("missing.py"),
            "--json",
        ],
    );
    assert!(success, "briefs failed: stderr={}", stderr);

    let briefs: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let briefs = briefs.as_array().unwrap();
    assert_eq!(briefs.len(), 1);
    assert_eq!(briefs[0]["extension"], ".md");
    assert!(briefs[0]["brief"]
        .as_str()
        .unwrap()
        .starts_with("Error generating summary:"));
}

#[test]
fn test_bad_config_rejected() {
    let env = setup_test_env();
    fs::write(
        &env.config_path,
        "[chunking]\nchunk_size = 100\nchunk_overlap = 150\n",
    )
    .unwrap();
    let (_, stderr, success) = run(&env.config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("chunk_overlap"), "stderr: {}", stderr);
}

#[test]
fn test_stats_before_index() {
    let env = setup_test_env();
    let (stdout, _, success) = run(&env.config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("does not exist yet"));
}

#[test]
fn test_ask_requires_a_file() {
    let env = setup_test_env();
    let (stdout, stderr, success) = run(&env.config_path, &["ask", "what is alpha about?"]);
    assert!(!success, "ask without --file should fail: stdout={}", stdout);
    assert!(stderr.contains("--file"), "stderr: {}", stderr);
}
