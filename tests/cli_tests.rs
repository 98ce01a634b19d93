//! End-to-end CLI tests using `assert_cmd`.
//!
//! These tests invoke the actual compiled binary against temporary output
//! trees. They do NOT require OCR tools or an LLM to be running.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::{TempDir, tempdir};

/// Binary with an isolated config directory and no OCRGANIZER_* overrides.
fn cmd(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("ocrganizer").unwrap();
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env_remove("OCRGANIZER_OUTPUT")
        .env_remove("OCRGANIZER_PROVIDER")
        .env_remove("OCRGANIZER_MODEL");
    cmd
}

fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"%PDF-1.4\n").unwrap();
}

fn pdf_count(dir: &Path) -> usize {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "pdf"))
        .count()
}

/// Output tree holding the same bank under two folder spellings.
fn wells_fargo_tree() -> TempDir {
    let dir = tempdir().unwrap();
    for month in ["01 - January", "02 - February", "03 - March"] {
        touch(&dir.path().join("Wells_Fargo/2023").join(month).join("statement.pdf"));
    }
    touch(&dir.path().join("Wells_Fargo_Bank/2023/04 - April/statement.pdf"));
    touch(&dir.path().join("Chase_Bank/2023/01 - January/statement.pdf"));
    dir
}

/// Config that files everything without OCR and with a dummy cloud key.
fn write_offline_config(home: &Path) {
    let config_dir = home.join(".config/ocrganizer");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("config.toml"),
        r#"
default_provider = "openai"

[providers.openai]
api_key = "sk-test"

[processing]
enable_ocr = false
"#,
    )
    .unwrap();
}

// ─── Help / version ─────────────────────────────────────────────────────

#[test]
fn test_help_shows_commands() {
    let home = tempdir().unwrap();
    cmd(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("organize"))
        .stdout(predicate::str::contains("companies"))
        .stdout(predicate::str::contains("merge"))
        .stdout(predicate::str::contains("undo"))
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("doctor"));
}

#[test]
fn test_version_shows_name() {
    let home = tempdir().unwrap();
    cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ocrganizer"));
}

// ─── Organize argument validation ───────────────────────────────────────

#[test]
fn test_organize_help() {
    let home = tempdir().unwrap();
    cmd(home.path())
        .args(["organize", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("INPUT"))
        .stdout(predicate::str::contains("--provider"))
        .stdout(predicate::str::contains("--threshold"))
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn test_organize_requires_input() {
    let home = tempdir().unwrap();
    cmd(home.path())
        .arg("organize")
        .assert()
        .failure()
        .stderr(predicate::str::contains("INPUT"));
}

#[test]
fn test_organize_rejects_invalid_provider() {
    let home = tempdir().unwrap();
    cmd(home.path())
        .args(["organize", "/tmp", "--provider", "gemini"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_organize_rejects_out_of_range_threshold() {
    let home = tempdir().unwrap();
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    cmd(home.path())
        .args(["organize"])
        .arg(input.path())
        .arg("-o")
        .arg(output.path())
        .args(["--threshold", "1.5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("company_similarity_threshold"));
}

#[test]
fn test_organize_missing_input_fails() {
    let home = tempdir().unwrap();
    let output = tempdir().unwrap();
    cmd(home.path())
        .args(["organize", "/definitely/not/here"])
        .arg("-o")
        .arg(output.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("not/here"));
}

#[test]
fn test_organize_empty_input_is_a_no_op() {
    let home = tempdir().unwrap();
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    cmd(home.path())
        .arg("organize")
        .arg(input.path())
        .arg("-o")
        .arg(output.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No valid PDF files found"));
}

// ─── Organize without a model (unreadable PDFs take the fallback path) ──

#[test]
fn test_organize_dry_run_leaves_files_in_place() {
    let home = tempdir().unwrap();
    write_offline_config(home.path());
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    let pdf = input.path().join("scan_2023_04_01.pdf");
    touch(&pdf);

    cmd(home.path())
        .arg("organize")
        .arg(input.path())
        .arg("-o")
        .arg(output.path())
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Unknown_document_2023-04-01.pdf"))
        .stdout(predicate::str::contains("Dry run"));

    assert!(pdf.exists());
    assert_eq!(pdf_count(output.path()), 0);
}

#[test]
fn test_organize_then_undo_round_trip() {
    let home = tempdir().unwrap();
    write_offline_config(home.path());
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    let pdf = input.path().join("scan_2023_04_01.pdf");
    touch(&pdf);

    cmd(home.path())
        .arg("organize")
        .arg(input.path())
        .arg("-o")
        .arg(output.path())
        .assert()
        .success();

    let filed = output
        .path()
        .join("Unknown/2023/04 - April/Unknown_document_2023-04-01.pdf");
    assert!(filed.exists());
    assert!(!pdf.exists());
    assert!(output.path().join(".ocrganizer_history.json").exists());

    cmd(home.path())
        .arg("undo")
        .arg("-o")
        .arg(output.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Restored 1 files"));

    assert!(pdf.exists());
    assert!(!output.path().join("Unknown").exists());
    assert!(!output.path().join(".ocrganizer_history.json").exists());
}

#[test]
fn test_organize_copy_keeps_original() {
    let home = tempdir().unwrap();
    write_offline_config(home.path());
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    let pdf = input.path().join("scan_2023_04_01.pdf");
    touch(&pdf);

    cmd(home.path())
        .arg("organize")
        .arg(&pdf)
        .arg("-o")
        .arg(output.path())
        .args(["--copy", "--structure", "{company}/{year}"])
        .assert()
        .success();

    assert!(pdf.exists());
    assert!(
        output
            .path()
            .join("Unknown/2023/Unknown_document_2023-04-01.pdf")
            .exists()
    );
}

// ─── Companies ──────────────────────────────────────────────────────────

#[test]
fn test_companies_lists_folders() {
    let home = tempdir().unwrap();
    let output = wells_fargo_tree();
    cmd(home.path())
        .arg("companies")
        .arg("-o")
        .arg(output.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Wells Fargo"))
        .stdout(predicate::str::contains("Chase Bank"))
        .stdout(predicate::str::contains("3 companies"));

    // Listing never merges
    assert!(output.path().join("Wells_Fargo_Bank").exists());
}

#[test]
fn test_companies_json_output() {
    let home = tempdir().unwrap();
    let output = wells_fargo_tree();
    let assert = cmd(home.path())
        .args(["companies", "--json"])
        .arg("-o")
        .arg(output.path())
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value["statistics"]["total_companies"], 3);
    let folders: Vec<&str> = value["companies"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["folder_name"].as_str().unwrap())
        .collect();
    assert!(folders.contains(&"Wells_Fargo"));
    assert!(folders.contains(&"Chase_Bank"));
}

#[test]
fn test_companies_resolve_exact_and_new() {
    let home = tempdir().unwrap();
    let output = wells_fargo_tree();

    cmd(home.path())
        .args(["companies", "--json", "--resolve", "CHASE BANK"])
        .arg("-o")
        .arg(output.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""match": "exact""#))
        .stdout(predicate::str::contains(r#""folder_name": "Chase_Bank""#));

    cmd(home.path())
        .args(["companies", "--resolve", "Acme Corp"])
        .arg("-o")
        .arg(output.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("would create a new company"));
}

#[test]
fn test_companies_on_missing_output_dir() {
    let home = tempdir().unwrap();
    let output = tempdir().unwrap();
    cmd(home.path())
        .arg("companies")
        .arg("-o")
        .arg(output.path().join("nothing-yet"))
        .assert()
        .success()
        .stdout(predicate::str::contains("No company folders found"));
}

// ─── Merge ──────────────────────────────────────────────────────────────

#[test]
fn test_merge_dry_run_reports_without_moving() {
    let home = tempdir().unwrap();
    let output = wells_fargo_tree();
    cmd(home.path())
        .args(["merge", "--dry-run"])
        .arg("-o")
        .arg(output.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Would merge 1 pair"))
        .stdout(predicate::str::contains("Wells_Fargo_Bank"));

    assert!(output.path().join("Wells_Fargo_Bank").exists());
    assert_eq!(pdf_count(output.path()), 5);
}

#[test]
fn test_merge_consolidates_duplicate_folders() {
    let home = tempdir().unwrap();
    let output = wells_fargo_tree();
    cmd(home.path())
        .arg("merge")
        .arg("-o")
        .arg(output.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Merged"))
        .stdout(predicate::str::contains("2 companies remain"));

    assert!(!output.path().join("Wells_Fargo_Bank").exists());
    assert_eq!(pdf_count(&output.path().join("Wells_Fargo")), 4);
    assert_eq!(pdf_count(&output.path().join("Chase_Bank")), 1);
}

#[test]
fn test_merge_with_nothing_to_do() {
    let home = tempdir().unwrap();
    let output = tempdir().unwrap();
    touch(&output.path().join("Acme_Corp/a.pdf"));
    touch(&output.path().join("Globex/b.pdf"));
    cmd(home.path())
        .arg("merge")
        .arg("-o")
        .arg(output.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No duplicate company folders found"));
}

// ─── Undo / init ────────────────────────────────────────────────────────

#[test]
fn test_undo_without_history() {
    let home = tempdir().unwrap();
    let output = tempdir().unwrap();
    cmd(home.path())
        .arg("undo")
        .arg("-o")
        .arg(output.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to undo"));
}

#[test]
fn test_init_writes_config_once() {
    let home = tempdir().unwrap();
    cmd(home.path()).arg("init").assert().success();

    let entries: Vec<_> = walkdir::WalkDir::new(home.path())
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name() == "config.toml")
        .collect();
    assert_eq!(entries.len(), 1);
    let content = fs::read_to_string(entries[0].path()).unwrap();
    assert!(content.contains("company_similarity_threshold"));

    cmd(home.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}
