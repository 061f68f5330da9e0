//! Per-run workflow state.
//!
//! A [`RunContext`] is created fresh for every workflow invocation and
//! threaded mutably through each step. It owns the derived run paths, the
//! environment overlay, cloned-repository metadata, and the output buffer
//! for whichever step is currently in flight.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Local;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Timestamp format used as a run-directory name component.
pub const DATE_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Lowercase a name and collapse whitespace runs to single underscores,
/// making it safe to use as a path component.
pub fn sanitize_name(name: &str) -> String {
    WHITESPACE.replace_all(&name.to_lowercase(), "_").to_string()
}

/// Metadata recorded for a cloned repository.
///
/// Descriptive only; nothing downstream depends on it beyond the
/// human-readable run report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoMetadata {
    /// Branch requested at clone time, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    /// One line of `<hash> <author> <subject>` for the checked-out HEAD
    pub last_commit: String,

    /// Raw submodule status output
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub submodules: String,
}

/// Mutable state shared by every step of a single workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunContext {
    /// Workflow name as registered
    pub name: String,

    /// Timestamp component of the run directory
    pub date: String,

    /// Root directory relative step paths resolve against
    pub work_dir: PathBuf,

    /// Directory holding everything this run persists
    pub run_dir: PathBuf,

    /// Subdirectory of `run_dir` receiving per-step log files
    pub log_dir: PathBuf,

    /// Environment overlay applied to every subsequent command
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Metadata for repositories cloned so far, keyed by source URL
    #[serde(default)]
    pub repos: HashMap<String, RepoMetadata>,

    /// When set, steps describe their effects instead of performing them
    #[serde(default)]
    pub dry_run: bool,

    /// Output buffered for the step currently executing.
    ///
    /// Owned by the executor: cleared before each step, flushed to the
    /// step's log file (and cleared again) after it.
    #[serde(skip)]
    pub output: String,
}

impl RunContext {
    /// Create the context for a new run of `name`.
    ///
    /// The run directory is derived as `logs_root/<date>/<sanitized name>`
    /// with a `logs` subdirectory for per-step output.
    pub fn new(name: &str, work_dir: PathBuf, logs_root: &Path, dry_run: bool) -> Self {
        let date = Local::now().format(DATE_FORMAT).to_string();
        let run_dir = logs_root.join(&date).join(sanitize_name(name));
        let log_dir = run_dir.join("logs");

        Self {
            name: name.to_string(),
            date,
            work_dir,
            run_dir,
            log_dir,
            env: HashMap::new(),
            repos: HashMap::new(),
            dry_run,
            output: String::new(),
        }
    }

    /// Resolve a step directory argument.
    ///
    /// Absolute paths pass through untouched; relative paths land under
    /// the work directory.
    pub fn resolve_dir(&self, dir: &str) -> PathBuf {
        let path = Path::new(dir);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.work_dir.join(path)
        }
    }

    /// Append a line to the current step's output buffer.
    pub fn record(&mut self, line: impl AsRef<str>) {
        let line = line.as_ref();
        self.output.push_str(line);
        if !line.ends_with('\n') {
            self.output.push('\n');
        }
    }

    /// Take the buffered output, leaving the buffer empty for the next step.
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }
}
