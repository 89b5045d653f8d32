use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

fn qasync_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("qasync");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();

    fs::create_dir_all(root.join("config")).unwrap();
    fs::create_dir_all(root.join("docs")).unwrap();
    fs::write(root.join("docs/faq.md"), "### What is X?\nA thing.\n").unwrap();

    let config_path = root.join("config/qasync.toml");
    fs::write(
        &config_path,
        r#"[store]
url = "http://127.0.0.1:9"

[[collections]]
name = "QAEntry"
kind = "qa"
root = "../docs"
"#,
    )
    .unwrap();

    (tmp, config_path)
}

fn run(args: &[&str], config: &PathBuf) -> Output {
    Command::new(qasync_binary())
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run qasync")
}

#[test]
fn test_help() {
    let output = Command::new(qasync_binary()).arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("sync"));
    assert!(stdout.contains("collections"));
}

#[test]
fn test_collections_lists_configured() {
    let (_tmp, config) = setup_test_env();
    let output = run(&["collections"], &config);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("QAEntry"));
    assert!(stdout.contains("qa"));
}

#[test]
fn test_unknown_collection_fails() {
    let (_tmp, config) = setup_test_env();
    let output = run(&["sync", "--collection", "Nope"], &config);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unknown collection"));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let output = run(&["collections"], &tmp.path().join("absent.toml"));

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to read config file"));
}
