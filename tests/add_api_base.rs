//! End-to-end tests for the `add-api-base` binary: scripted answers on stdin,
//! project fixtures in a temp dir.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

const API_BASE: &str = r#"openai.api_base = os.environ.get("OPENAI_API_BASE")"#;

fn binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push(format!("add-api-base{}", std::env::consts::EXE_SUFFIX));
    path
}

/// Run the patcher with `answers` fed to stdin, one per line.
fn run(args: &[&str], answers: &[&str]) -> (String, String, i32) {
    let mut child = Command::new(binary())
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap_or_else(|e| panic!("Failed to run add-api-base at {:?}: {}", binary(), e));

    {
        let mut stdin = child.stdin.take().unwrap();
        for answer in answers {
            writeln!(stdin, "{}", answer).unwrap();
        }
    }

    let output = child.wait_with_output().unwrap();
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

fn project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join("app/services")).unwrap();
    fs::write(
        root.join("app/services/chat.py"),
        "import os\nimport openai\n\ndef init():\n    openai.api_key = os.environ[\"OPENAI_API_KEY\"]\n    return openai\n",
    )
    .unwrap();
    fs::write(root.join("app/util.py"), "def add(a, b):\n    return a + b\n").unwrap();
    fs::write(root.join("README.md"), "openai.api_key = 'not python'\n").unwrap();
    tmp
}

fn path_arg(path: &Path) -> String {
    path.to_str().unwrap().to_string()
}

#[test]
fn test_inserts_line_below_marker() {
    let tmp = project();
    let root = path_arg(tmp.path());

    let (stdout, stderr, code) = run(&[&root], &["n", "y"]);
    assert_eq!(code, 0, "stderr: {}", stderr);

    let patched = fs::read_to_string(tmp.path().join("app/services/chat.py")).unwrap();
    assert_eq!(
        patched,
        format!(
            "import os\nimport openai\n\ndef init():\n    openai.api_key = os.environ[\"OPENAI_API_KEY\"]\n    {}\n    return openai\n",
            API_BASE
        )
    );

    assert!(stdout.contains("Potential spot found!"));
    assert!(stdout.contains("Line 5: openai.api_key = os.environ[\"OPENAI_API_KEY\"]"));
    assert!(stdout.contains("Do you want to open the file? (y/n)"));
    assert!(stdout.contains("API base added to file"));
    assert!(stdout.contains("chat.py, 1 lines added."));
    assert!(stdout.contains("util.py, 0 lines added."));
    assert!(stdout.contains("Done: 2 files scanned, 1 spots found, 1 lines added."));
}

#[test]
fn test_non_python_files_untouched() {
    let tmp = project();
    let root = path_arg(tmp.path());

    let (stdout, _, code) = run(&[&root], &["n", "y"]);
    assert_eq!(code, 0);
    assert!(!stdout.contains("README.md"));
    assert_eq!(
        fs::read_to_string(tmp.path().join("README.md")).unwrap(),
        "openai.api_key = 'not python'\n"
    );
}

#[test]
fn test_declined_leaves_files_unchanged() {
    let tmp = project();
    let root = path_arg(tmp.path());
    let before = fs::read(tmp.path().join("app/services/chat.py")).unwrap();

    let (stdout, _, code) = run(&[&root], &["n", "n"]);
    assert_eq!(code, 0);
    assert_eq!(
        fs::read(tmp.path().join("app/services/chat.py")).unwrap(),
        before
    );
    assert!(stdout.contains("chat.py, 0 lines added."));
}

#[test]
fn test_second_run_finds_nothing_to_patch() {
    let tmp = project();
    let root = path_arg(tmp.path());

    let (_, _, code) = run(&[&root], &["n", "y"]);
    assert_eq!(code, 0);
    let once = fs::read(tmp.path().join("app/services/chat.py")).unwrap();

    let (stdout, _, code) = run(&[&root], &["y", "y"]);
    assert_eq!(code, 0);
    assert!(!stdout.contains("Potential spot found!"));
    assert_eq!(fs::read(tmp.path().join("app/services/chat.py")).unwrap(), once);
}

#[test]
fn test_visits_nested_files_once_each() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    for dir in ["a", "a/b", "a/b/c"] {
        fs::create_dir_all(root.join(dir)).unwrap();
        fs::write(root.join(dir).join("keys.py"), "openai.api_key = KEY\n").unwrap();
    }

    let (stdout, _, code) = run(&[&path_arg(root)], &["n", "y", "n", "y", "n", "y"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.matches("Processing file:").count(), 3);
    for dir in ["a", "a/b", "a/b/c"] {
        assert_eq!(
            fs::read_to_string(root.join(dir).join("keys.py")).unwrap(),
            format!("openai.api_key = KEY\n{}\n", API_BASE)
        );
    }
}

#[test]
fn test_dry_run_writes_nothing() {
    let tmp = project();
    let root = path_arg(tmp.path());
    let before = fs::read(tmp.path().join("app/services/chat.py")).unwrap();

    let (stdout, _, code) = run(&[&root, "--dry-run"], &[]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Dry run: would add API base after line 5"));
    assert!(!stdout.contains("(y/n)"));
    assert_eq!(
        fs::read(tmp.path().join("app/services/chat.py")).unwrap(),
        before
    );
}

#[test]
fn test_json_progress() {
    let tmp = project();
    let root = path_arg(tmp.path());

    let (stdout, _, code) = run(&[&root, "--json", "--dry-run"], &[]);
    assert_eq!(code, 0);
    let events: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(events.last().unwrap()["event"], "finished");
    assert_eq!(events.last().unwrap()["files_scanned"], 2);
    assert!(events.iter().any(|e| e["event"] == "would_insert"));
}

#[test]
fn test_json_prompts_stay_off_stdout() {
    let tmp = project();
    let root = path_arg(tmp.path());

    let (stdout, stderr, code) = run(&[&root, "--json"], &["n", "y"]);
    assert_eq!(code, 0, "stderr: {}", stderr);
    let events: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| {
            serde_json::from_str(l).unwrap_or_else(|e| panic!("not JSON: {:?}: {}", l, e))
        })
        .collect();
    assert!(events.iter().any(|e| e["event"] == "line_inserted"));
    assert_eq!(events.last().unwrap()["lines_added"], 1);
    assert!(stderr.contains("Do you want to open the file? (y/n)"));
}

#[cfg(unix)]
#[test]
fn test_symlinked_source_patches_target() {
    let tmp = TempDir::new().unwrap();
    let shared = tmp.path().join("shared");
    let proj = tmp.path().join("proj");
    fs::create_dir_all(&shared).unwrap();
    fs::create_dir_all(&proj).unwrap();
    fs::write(shared.join("settings.txt"), "openai.api_key = K\n").unwrap();
    std::os::unix::fs::symlink(shared.join("settings.txt"), proj.join("settings.py")).unwrap();

    let (stdout, stderr, code) = run(&[&path_arg(&proj)], &["n", "y"]);
    assert_eq!(code, 0, "stderr: {}", stderr);
    assert!(stdout.contains("Done: 1 files scanned, 1 spots found, 1 lines added."));
    assert!(fs::symlink_metadata(proj.join("settings.py"))
        .unwrap()
        .file_type()
        .is_symlink());
    assert_eq!(
        fs::read_to_string(shared.join("settings.txt")).unwrap(),
        format!("openai.api_key = K\n{}\n", API_BASE)
    );
}

#[test]
fn test_missing_argument_exits_1() {
    let (_, stderr, code) = run(&[], &[]);
    assert_eq!(code, 1);
    assert!(stderr.contains("Usage"));
}

#[test]
fn test_extra_argument_exits_1() {
    let tmp = project();
    let root = path_arg(tmp.path());
    let (_, _, code) = run(&[&root, "extra"], &[]);
    assert_eq!(code, 1);
}

#[test]
fn test_not_a_directory_exits_1() {
    let tmp = project();
    let file = path_arg(&tmp.path().join("app/util.py"));
    let (_, stderr, code) = run(&[&file], &[]);
    assert_eq!(code, 1);
    assert!(stderr.contains("is not a directory"));
}

#[test]
fn test_closed_stdin_aborts() {
    let tmp = project();
    let root = path_arg(tmp.path());
    let (_, stderr, code) = run(&[&root], &[]);
    assert_eq!(code, 1);
    assert!(stderr.contains("Input closed"));
}

#[cfg(target_os = "linux")]
#[test]
fn test_open_on_linux_is_unsupported() {
    let tmp = project();
    let config = tmp.path().join("herd.toml");
    fs::write(&config, "[patcher.editor]\ncommand = \"\"\n").unwrap();

    let before = fs::read(tmp.path().join("app/services/chat.py")).unwrap();
    let (stdout, _, code) = run(
        &[&path_arg(tmp.path()), "--config", &path_arg(&config)],
        &["y", "y"],
    );
    assert_eq!(code, 1);
    assert!(stdout.contains("Unsupported platform"));
    assert_eq!(
        fs::read(tmp.path().join("app/services/chat.py")).unwrap(),
        before
    );
}

#[test]
fn test_custom_marker_from_config() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    fs::write(root.join("client.py"), "  client.key = KEY\n").unwrap();
    let config = root.join("herd.toml");
    fs::write(
        &config,
        "[patcher]\nmarker = \"client.key\"\ncompanion_marker = \"client.base\"\ninsert_line = \"client.base = BASE\"\n",
    )
    .unwrap();

    let (_, _, code) = run(
        &[&path_arg(root), "--config", &path_arg(&config)],
        &["n", "y"],
    );
    assert_eq!(code, 0);
    assert_eq!(
        fs::read_to_string(root.join("client.py")).unwrap(),
        "  client.key = KEY\n  client.base = BASE\n"
    );
}
