//! Workflow Integration Tests
//!
//! Drives `WorkflowRunner` through the real shell against throwaway
//! directories: run layout on disk, failure forensics, environment
//! overlay, repository cloning and manifest rewriting.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command as ProcessCommand;

use regex::Regex;
use tempfile::TempDir;

use integr::workflow::StepSpec;
use integr::{Config, RunState, RunStatus, ShellRunner, Workflow, WorkflowRunner};

fn config_for(root: &Path) -> Config {
    Config {
        work_dir: root.join("work"),
        logs_root: root.join("logs"),
        dry_run: false,
    }
}

fn workflow(name: &str, steps: Vec<StepSpec>) -> Workflow {
    Workflow { name: name.into(), repos: Vec::new(), steps }
}

/// Descend `logs_root/<date>/<name>` to the single run directory.
fn only_run_dir(logs_root: &Path) -> PathBuf {
    let date_dir = fs::read_dir(logs_root).unwrap().next().unwrap().unwrap().path();
    fs::read_dir(&date_dir).unwrap().next().unwrap().unwrap().path()
}

// ============================================================================
// Run Layout Tests
// ============================================================================

#[test]
fn test_run_records_status_and_step_logs() {
    let temp = TempDir::new().unwrap();
    let config = config_for(temp.path());
    let shell = ShellRunner::new();
    let runner = WorkflowRunner::new(&shell, &config);

    let wf = workflow(
        "layout",
        vec![
            StepSpec::SetEnv { key: "GREETING".into(), value: "hello".into() },
            StepSpec::EnsureDir { dir: "pkg".into() },
            StepSpec::Exec { dir: "pkg".into(), command: "echo hello".into() },
        ],
    );

    let report = runner.run(&wf).unwrap();
    assert!(report.success());

    let run_dir = only_run_dir(&config.logs_root);
    assert_eq!(report.run_dir.as_deref(), Some(run_dir.as_path()));

    let status = RunStatus::load(&run_dir).unwrap();
    assert_eq!(status.status, RunState::Done);
    assert!(status.duration_ms.is_some());

    // The log-dir step is prepended, so 3 workflow steps become 4 records
    assert_eq!(status.steps.len(), 4);
    for step in &status.steps {
        assert_eq!(step.status, RunState::Done);
    }
    assert_eq!(status.steps[0].log_path.as_deref(), Some("logs/0-ensure_directory.log"));

    // Every step left a log behind
    let log_dir = run_dir.join("logs");
    assert!(log_dir.join("0-ensure_directory.log").exists());
    assert!(log_dir.join("1-set_environment.log").exists());
    assert!(log_dir.join("2-ensure_directory.log").exists());
    assert!(log_dir.join("3-execute.log").exists());

    let exec_log = fs::read_to_string(log_dir.join("3-execute.log")).unwrap();
    assert!(exec_log.contains("$ echo hello"));
    assert!(exec_log.contains("hello"));

    // The persisted context carries the environment overlay
    assert_eq!(status.context.env.get("GREETING").map(String::as_str), Some("hello"));

    assert!(config.work_dir.join("pkg").is_dir());
}

#[test]
fn test_repeated_step_kinds_get_distinct_logs() {
    let temp = TempDir::new().unwrap();
    let config = config_for(temp.path());
    let shell = ShellRunner::new();
    let runner = WorkflowRunner::new(&shell, &config);

    let wf = workflow(
        "twice",
        vec![
            StepSpec::Exec { dir: ".".into(), command: "echo first".into() },
            StepSpec::Exec { dir: ".".into(), command: "echo second".into() },
        ],
    );
    runner.run(&wf).unwrap();

    let log_dir = only_run_dir(&config.logs_root).join("logs");
    let first = fs::read_to_string(log_dir.join("1-execute.log")).unwrap();
    let second = fs::read_to_string(log_dir.join("2-execute.log")).unwrap();
    assert!(first.contains("first"));
    assert!(second.contains("second"));
}

// ============================================================================
// Failure Forensics Tests
// ============================================================================

#[test]
fn test_failing_command_preserves_forensics() {
    let temp = TempDir::new().unwrap();
    let config = config_for(temp.path());
    let shell = ShellRunner::new();
    let runner = WorkflowRunner::new(&shell, &config);

    let wf = workflow(
        "broken",
        vec![
            StepSpec::Exec { dir: ".".into(), command: "echo ok".into() },
            StepSpec::Exec { dir: ".".into(), command: "echo boom >&2 && exit 7".into() },
            StepSpec::Exec { dir: ".".into(), command: "echo never".into() },
        ],
    );

    let report = runner.run(&wf).unwrap();
    assert!(!report.success());
    let failed_step = report.failed_step.unwrap();
    assert!(failed_step.contains("echo boom"));

    let run_dir = only_run_dir(&config.logs_root);
    let status = RunStatus::load(&run_dir).unwrap();
    assert_eq!(status.status, RunState::Failed);
    assert!(status.duration_ms.is_some());

    // ensure-dir + first exec done, second exec failed, third never started
    assert_eq!(status.steps.len(), 3);
    assert_eq!(status.steps[1].status, RunState::Done);
    assert_eq!(status.steps[2].status, RunState::Failed);

    let log_dir = run_dir.join("logs");
    let failed_log = fs::read_to_string(log_dir.join("2-execute.log")).unwrap();
    assert!(failed_log.contains("boom"));
    assert!(failed_log.contains("# step failed"));
    assert!(!log_dir.join("3-execute.log").exists());
}

// ============================================================================
// Environment Overlay Tests
// ============================================================================

#[test]
fn test_env_overlay_reaches_commands() {
    let temp = TempDir::new().unwrap();
    let config = config_for(temp.path());
    let shell = ShellRunner::new();
    let runner = WorkflowRunner::new(&shell, &config);

    let wf = workflow(
        "overlay",
        vec![
            StepSpec::SetEnv { key: "INTEGR_IT_VALUE".into(), value: "linked".into() },
            StepSpec::Exec {
                dir: ".".into(),
                command: r#"printf '%s' "$INTEGR_IT_VALUE" > observed.txt"#.into(),
            },
        ],
    );
    let report = runner.run(&wf).unwrap();
    assert!(report.success());

    let observed = fs::read_to_string(config.work_dir.join("observed.txt")).unwrap();
    assert_eq!(observed, "linked");
}

// ============================================================================
// Clone Tests
// ============================================================================

fn git_available() -> bool {
    ProcessCommand::new("git")
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

/// Create a one-commit git repository to clone from.
fn init_fixture_repo(dir: &Path) {
    let git = |args: &[&str]| {
        let status = ProcessCommand::new("git")
            .args(args)
            .current_dir(dir)
            .env("GIT_AUTHOR_NAME", "fixture")
            .env("GIT_AUTHOR_EMAIL", "fixture@example.com")
            .env("GIT_COMMITTER_NAME", "fixture")
            .env("GIT_COMMITTER_EMAIL", "fixture@example.com")
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?} failed");
    };
    git(&["init", "--quiet"]);
    fs::write(dir.join("README.md"), "fixture\n").unwrap();
    git(&["add", "."]);
    git(&["commit", "--quiet", "-m", "initial commit"]);
}

#[test]
fn test_clone_records_repository_metadata() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }

    let upstream = TempDir::new().unwrap();
    init_fixture_repo(upstream.path());
    let url = upstream.path().display().to_string();

    let temp = TempDir::new().unwrap();
    let config = config_for(temp.path());
    let shell = ShellRunner::new();
    let runner = WorkflowRunner::new(&shell, &config);

    let wf = workflow(
        "cloned",
        vec![StepSpec::Clone { dir: "repo".into(), url: url.clone(), branch: None }],
    );
    let report = runner.run(&wf).unwrap();
    assert!(report.success());

    assert!(config.work_dir.join("repo").join(".git").exists());
    assert!(config.work_dir.join("repo").join("README.md").exists());

    let status = RunStatus::load(&only_run_dir(&config.logs_root)).unwrap();
    let meta = status.context.repos.get(&url).expect("clone metadata recorded");
    let commit_line = Regex::new(r"^[0-9a-f]{40} fixture initial commit$").unwrap();
    assert!(
        commit_line.is_match(&meta.last_commit),
        "unexpected commit line: {:?}",
        meta.last_commit
    );
    assert!(meta.branch.is_none());
}

// ============================================================================
// Rewrite Tests
// ============================================================================

#[test]
fn test_rewrite_deps_inside_workflow() {
    let temp = TempDir::new().unwrap();
    let config = config_for(temp.path());
    let shell = ShellRunner::new();
    let runner = WorkflowRunner::new(&shell, &config);

    let pkg_dir = config.work_dir.join("alpha");
    fs::create_dir_all(&pkg_dir).unwrap();
    fs::write(
        pkg_dir.join("package.json"),
        r#"{
  "name": "alpha",
  "dependencies": {
    "beta-lib": "^2.0.0"
  }
}
"#,
    )
    .unwrap();

    let mut deps = BTreeMap::new();
    deps.insert("beta-lib".to_string(), "beta.tgz".to_string());
    let wf =
        workflow("relink", vec![StepSpec::RewriteDeps { dir: "alpha".into(), deps }]);
    let report = runner.run(&wf).unwrap();
    assert!(report.success());

    let rewritten = fs::read_to_string(pkg_dir.join("package.json")).unwrap();
    assert!(rewritten.contains("file:../beta.tgz"));
    assert!(!rewritten.contains("^2.0.0"));

    let log_dir = only_run_dir(&config.logs_root).join("logs");
    let log = fs::read_to_string(log_dir.join("1-rewrite_dependencies.log")).unwrap();
    assert!(log.contains("beta-lib -> file:../beta.tgz"));
}

// ============================================================================
// Dry Run Tests
// ============================================================================

#[test]
fn test_dry_run_performs_no_work() {
    let temp = TempDir::new().unwrap();
    let mut config = config_for(temp.path());
    config.dry_run = true;
    let shell = ShellRunner::new();
    let runner = WorkflowRunner::new(&shell, &config);

    let wf = workflow(
        "phantom",
        vec![
            StepSpec::EnsureDir { dir: "pkg".into() },
            StepSpec::Exec { dir: "pkg".into(), command: "touch should-not-exist".into() },
        ],
    );
    let report = runner.run(&wf).unwrap();

    assert!(report.success());
    assert!(report.run_dir.is_none());
    assert!(!config.work_dir.exists());
    assert!(!config.logs_root.exists());
}
