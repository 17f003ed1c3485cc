//! CLI integration tests using assert_cmd.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

const STUDENT: &str = "7f1c2d3e-0000-4000-8000-000000000001";

/// A command isolated from the caller's config and provider credentials.
fn quizforge(dir: &Path) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("quizforge").unwrap();
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env_remove("GEMINI_API_KEY")
        .env_remove("QUIZFORGE_GEMINI_KEY")
        .env_remove("GEMINI_MODEL")
        .env_remove("QUIZFORGE_GEMINI_MODEL")
        .env_remove("RUST_LOG");
    cmd
}

fn json_stdout(cmd: &mut Command) -> Value {
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).unwrap()
}

fn generate(dir: &Path, subject: &str, count: u32) -> String {
    let body = json_stdout(quizforge(dir).args([
        "generate",
        "--student",
        STUDENT,
        "--subject",
        subject,
        "--count",
        &count.to_string(),
        "--format",
        "json",
    ]));
    assert_eq!(body["status"], "READY");
    body["testId"].as_str().unwrap().to_string()
}

#[test]
fn help_output() {
    let dir = TempDir::new().unwrap();
    quizforge(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Adaptive assessment engine"));
}

#[test]
fn version_output() {
    let dir = TempDir::new().unwrap();
    quizforge(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("quizforge"));
}

#[test]
fn init_creates_config() {
    let dir = TempDir::new().unwrap();

    quizforge(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created quizforge.toml"));
    assert!(dir.path().join("quizforge.toml").exists());

    quizforge(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn generate_text_output_and_store_file() {
    let dir = TempDir::new().unwrap();

    quizforge(dir.path())
        .args(["generate", "--student", STUDENT, "--subject", "Физика", "--count", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Generated test"))
        .stdout(predicate::str::contains("5 questions, READY"));
    assert!(dir.path().join("quizforge-store.json").exists());
}

#[test]
fn show_redacts_answer_key() {
    let dir = TempDir::new().unwrap();
    let test_id = generate(dir.path(), "Физика", 3);

    let view = json_stdout(quizforge(dir.path()).args(["show", "--student", STUDENT, "--test", &test_id]));
    let questions = view["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 3);
    assert_eq!(questions[0]["options"].as_array().unwrap().len(), 4);
    assert!(questions[0]["options"][0].get("isCorrect").is_none());
    assert_eq!(view["timeLimitSec"], 600);
}

#[test]
fn full_flow_submit_review_history_progress() {
    let dir = TempDir::new().unwrap();
    let test_id = generate(dir.path(), "Физика", 3);

    let view = json_stdout(quizforge(dir.path()).args(["show", "--student", STUDENT, "--test", &test_id]));
    let answers: Vec<Value> = view["questions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| {
            serde_json::json!({
                "questionId": q["id"],
                "selectedOptionIds": [q["options"][0]["code"]]
            })
        })
        .collect();
    let answers_path = dir.path().join("answers.json");
    std::fs::write(
        &answers_path,
        serde_json::to_string(&serde_json::json!({ "answers": answers })).unwrap(),
    )
    .unwrap();

    let outcome = json_stdout(quizforge(dir.path()).args([
        "submit",
        "--student",
        STUDENT,
        "--test",
        &test_id,
        "--answers",
        answers_path.to_str().unwrap(),
        "--format",
        "json",
    ]));
    assert_eq!(outcome["status"], "COMPLETED");
    let attempt_id = outcome["attemptId"].as_str().unwrap().to_string();

    quizforge(dir.path())
        .args(["review", "--student", STUDENT, "--attempt", &attempt_id, "--format", "markdown"])
        .assert()
        .success()
        .stdout(predicate::str::contains("## Review: Физика"));

    let history = json_stdout(quizforge(dir.path()).args([
        "history", "--student", STUDENT, "--format", "json",
    ]));
    assert_eq!(history["total"], 1);
    assert_eq!(history["items"][0]["attemptId"], attempt_id.as_str());

    let progress = json_stdout(quizforge(dir.path()).args([
        "progress", "--student", STUDENT, "--subject", "Физика", "--format", "json",
    ]));
    assert_eq!(progress["progress"].as_array().unwrap().len(), 1);
}

#[test]
fn history_table_for_new_student() {
    let dir = TempDir::new().unwrap();
    quizforge(dir.path())
        .args(["history", "--student", STUDENT])
        .assert()
        .success()
        .stdout(predicate::str::contains("No attempts found"));
}

#[test]
fn invalid_count_is_rejected() {
    let dir = TempDir::new().unwrap();
    quizforge(dir.path())
        .args(["generate", "--student", STUDENT, "--subject", "Физика", "--count", "41"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("question count"));
}

#[test]
fn unknown_difficulty_is_rejected() {
    let dir = TempDir::new().unwrap();
    quizforge(dir.path())
        .args(["generate", "--student", STUDENT, "--subject", "Физика", "--difficulty", "extreme"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown difficulty"));
}

#[test]
fn unknown_test_is_not_found() {
    let dir = TempDir::new().unwrap();
    quizforge(dir.path())
        .args([
            "show",
            "--student",
            STUDENT,
            "--test",
            "00000000-0000-4000-8000-000000000000",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn missing_answers_file_fails() {
    let dir = TempDir::new().unwrap();
    let test_id = generate(dir.path(), "Физика", 3);
    quizforge(dir.path())
        .args([
            "submit",
            "--student",
            STUDENT,
            "--test",
            &test_id,
            "--answers",
            "no_such_file.json",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read answers"));
}
