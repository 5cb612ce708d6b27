//! Integration tests for the conductor-cli commands.
//!
//! These exercise the same code paths as the binary, using the `echo`
//! model (which replies with the prompt it receives) and temporary
//! directories for snapshot isolation.

use std::path::Path;

use conductor_cli::commands::run::{execute, RunOptions};
use conductor_cli::commands::{memory, validate};

fn write_config(dir: &Path, name: &str, yaml: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, yaml).unwrap();
    path.to_string_lossy().into_owned()
}

fn sequential_yaml(memory_dir: &Path) -> String {
    format!(
        r#"
name: "Echo chain"
agents:
  - id: researcher
    role: Researcher
    goal: Collect facts
    model: echo
  - id: writer
    role: Writer
    goal: Write the brief
    model: echo
workflow:
  type: sequential
  steps:
    - researcher
    - agent: writer
      input: "Write a short brief"
memory:
  dir: "{}"
"#,
        memory_dir.display()
    )
}

#[test]
fn test_validate_describes_plan() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "wf.yaml", &sequential_yaml(dir.path()));

    let text = validate::describe(&path).unwrap();
    assert!(text.contains("Workflow 'Echo chain' is valid"), "{}", text);
    assert!(text.contains("Type: sequential"));
    assert!(text.contains("1. researcher (Researcher, model: echo)"));
    assert!(text.contains("2. writer (Writer, model: echo) [custom input]"));
}

#[test]
fn test_validate_reports_every_problem() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        "bad.yaml",
        r#"
agents:
  - id: a
    role: One
    goal: Goal
    model: echo
  - id: a
    role: Again
    goal: Goal
    model: echo
workflow:
  type: parallel
  branches: [a, missing]
"#,
    );

    let err = validate::describe(&path).unwrap_err();
    assert!(err.contains("Duplicate agent id: 'a'"), "{}", err);
    assert!(err.contains("Branch references unknown agent: 'missing'"), "{}", err);
}

#[test]
fn test_validate_missing_file() {
    let err = validate::describe("/nonexistent/conductor/wf.yaml").unwrap_err();
    assert!(err.contains("Failed to read workflow file"), "{}", err);
}

#[tokio::test]
async fn test_run_sequential_with_echo_model() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "wf.yaml", &sequential_yaml(dir.path()));

    let options = RunOptions {
        workflow_id: Some("cli00001".to_string()),
        ..RunOptions::default()
    };
    let result = execute(&path, "renewable energy", &options).await.unwrap();
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.workflow_id, "cli00001");

    let researcher = &result.agent_outputs["researcher"];
    assert!(researcher.contains("## Original Query:\nrenewable energy"));

    // The writer's prompt carries the researcher's output and its own input.
    assert!(result.final_output.contains("### researcher:"));
    assert!(result.final_output.contains("## Original Query:\nWrite a short brief"));

    assert!(dir.path().join("cli00001.json").exists());
    let text = memory::summary("cli00001", &dir.path().to_string_lossy()).unwrap();
    assert!(text.contains("Workflow: cli00001"), "{}", text);
    assert!(text.contains("Agent outputs (2):"));
    assert!(text.contains("Last event: execution_complete"));
}

#[tokio::test]
async fn test_run_resume_restores_previous_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "wf.yaml", &sequential_yaml(dir.path()));

    let first = RunOptions {
        workflow_id: Some("resume01".to_string()),
        ..RunOptions::default()
    };
    let before = execute(&path, "first query", &first).await.unwrap();
    assert!(before.success);

    let resumed = RunOptions {
        workflow_id: Some("resume01".to_string()),
        resume: true,
        json: false,
    };
    let after = execute(&path, "second query", &resumed).await.unwrap();
    assert!(after.success);
    // The log keeps the first run's events and appends the second run's.
    assert!(after.execution_log.len() > before.execution_log.len());
    assert_eq!(
        after.execution_log[..before.execution_log.len()],
        before.execution_log[..]
    );
}

#[tokio::test]
async fn test_run_resume_requires_workflow_id() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "wf.yaml", &sequential_yaml(dir.path()));
    let options = RunOptions {
        resume: true,
        ..RunOptions::default()
    };
    let err = execute(&path, "q", &options).await.unwrap_err();
    assert!(err.contains("--workflow-id"));
}

#[tokio::test]
async fn test_run_parallel_failure_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        "wf.yaml",
        r#"
agents:
  - id: a
    role: One
    goal: Goal
    model: echo
workflow:
  type: parallel
  branches: [a, b]
"#,
    );
    let err = execute(&path, "q", &RunOptions::default()).await.unwrap_err();
    assert!(err.contains("unknown agent: 'b'"), "{}", err);
}

#[test]
fn test_memory_show_missing_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let err = memory::summary("nope", &dir.path().to_string_lossy()).unwrap_err();
    assert!(err.contains("No snapshot for workflow 'nope'"), "{}", err);
}
