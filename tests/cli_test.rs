mod common;

use common::{page_rotations, page_tags, sample_pdf, write_pdf};
use lopdf::Document;
use std::path::Path;
use std::process::Command;

/// Run the pdfarrange binary directly.
/// This avoids `cargo run` build-lock contention when tests run in parallel.
fn run_cli(args: &[&str], dir: &Path) -> (String, String, bool) {
    let bin = std::path::PathBuf::from(env!("CARGO_BIN_EXE_pdfarrange"));

    let output = Command::new(&bin)
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to execute pdfarrange");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_list_prints_pages_in_combined_order() {
    let dir = tempfile::tempdir().unwrap();
    write_pdf(dir.path(), "a.pdf", &sample_pdf(&["A1"]));
    write_pdf(dir.path(), "a_very_long_file_name.pdf", &sample_pdf(&["L1", "L2"]));

    let (stdout, stderr, success) = run_cli(&["list", "a.pdf", "a_very_long_file_name.pdf", "notes.txt"], dir.path());
    assert!(success, "list failed: {}", stderr);

    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains("a.pdf  page 1"));
    assert!(lines[2].contains("a_very_long_fil...  page 2"));
    assert!(stderr.contains("notes.txt"));
}

#[test]
fn test_merge_concatenates_files() {
    let dir = tempfile::tempdir().unwrap();
    write_pdf(dir.path(), "a.pdf", &sample_pdf(&["A1", "A2"]));
    write_pdf(dir.path(), "b.pdf", &sample_pdf(&["B1"]));

    let (stdout, stderr, success) = run_cli(&["merge", "a.pdf", "b.pdf", "-o", "out.pdf", "--quality", "high"], dir.path());
    assert!(success, "merge failed: {}", stderr);
    assert!(stdout.contains("3 pages"));

    let merged = Document::load(dir.path().join("out.pdf")).unwrap();
    assert_eq!(page_tags(&merged), vec!["A1", "A2", "B1"]);
}

#[test]
fn test_edit_applies_script() {
    let dir = tempfile::tempdir().unwrap();
    write_pdf(dir.path(), "a.pdf", &sample_pdf(&["A1", "A2", "A3"]));
    std::fs::write(
        dir.path().join("ops.json"),
        r#"[
            {"op": "move", "indices": [2], "target": 0},
            {"op": "rotate", "indices": [0]},
            {"op": "remove", "indices": [1]}
        ]"#,
    )
    .unwrap();

    let (_, stderr, success) = run_cli(
        &["edit", "a.pdf", "-o", "out.pdf", "--script", "ops.json", "--quality", "low"],
        dir.path(),
    );
    assert!(success, "edit failed: {}", stderr);

    let edited = Document::load(dir.path().join("out.pdf")).unwrap();
    assert_eq!(page_tags(&edited), vec!["A3", "A2"]);
    assert_eq!(page_rotations(&edited), vec![90, 0]);
}

#[test]
fn test_edit_with_bad_index_fails() {
    let dir = tempfile::tempdir().unwrap();
    write_pdf(dir.path(), "a.pdf", &sample_pdf(&["A1"]));
    std::fs::write(dir.path().join("ops.json"), r#"[{"op": "remove", "indices": [4]}]"#).unwrap();

    let (_, stderr, success) = run_cli(&["edit", "a.pdf", "-o", "out.pdf", "--script", "ops.json"], dir.path());
    assert!(!success);
    assert!(stderr.contains("Edit step 1 failed"));
    assert!(!dir.path().join("out.pdf").exists());
}

#[test]
fn test_invalid_quality_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_pdf(dir.path(), "a.pdf", &sample_pdf(&["A1"]));

    let (_, stderr, success) = run_cli(&["merge", "a.pdf", "-o", "out.pdf", "--quality", "ultra"], dir.path());
    assert!(!success);
    assert!(stderr.contains("Valid options"));
}

#[test]
fn test_missing_input_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (_, stderr, success) = run_cli(&["merge", "nope.pdf", "-o", "out.pdf"], dir.path());
    assert!(!success);
    assert!(stderr.contains("nope.pdf"));
}
